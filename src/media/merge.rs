//! Склейка упорядоченных аудиофрагментов в одну дорожку
//!
//! Все фрагменты сначала проверяются на совместимость и только потом
//! объединяются, поэтому несовпадение формата никогда не дает частичного результата.

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use crate::config::MergeConfig;
use crate::error::{Result, TtsMarkupError};
use super::format::{parse_wav, skip_id3v2, strip_id3v1, write_wav, AudioArtifact, AudioFormat, Container, WavLayout};

/// Итоговая дорожка
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedTrack {
    #[serde(skip)]
    pub bytes: Bytes,
    pub format: AudioFormat,
}

impl MergedTrack {
    /// Пустая дорожка для пустого входного текста
    pub fn empty() -> Self {
        Self {
            bytes: Bytes::new(),
            format: AudioFormat::unknown(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

impl From<AudioArtifact> for MergedTrack {
    fn from(artifact: AudioArtifact) -> Self {
        Self {
            bytes: artifact.bytes,
            format: artifact.format,
        }
    }
}

/// Склеить фрагменты в порядке следования.
///
/// Один фрагмент возвращается без изменений.
pub fn merge_artifacts(artifacts: &[AudioArtifact], config: &MergeConfig) -> Result<MergedTrack> {
    match artifacts {
        [] => Err(TtsMarkupError::NothingToMerge),
        [single] => Ok(single.clone().into()),
        [first, rest @ ..] => {
            if let Some((index, other)) = rest
                .iter()
                .enumerate()
                .find(|(_, a)| a.format.container != first.format.container)
            {
                return Err(TtsMarkupError::FormatMismatch(format!(
                    "artifact {} is {:?}, artifact 0 is {:?}",
                    index + 1,
                    other.format.container,
                    first.format.container
                )));
            }

            let track = match first.format.container {
                Container::Wav => merge_wav(artifacts, config)?,
                Container::Mp3 => merge_mpeg(artifacts, config)?,
                Container::Unknown => {
                    return Err(TtsMarkupError::InvalidFormat(
                        "cannot merge audio of unknown container".to_string(),
                    ))
                }
            };
            log::info!(
                "Merged {} audio parts into {} bytes ({:?})",
                artifacts.len(),
                track.bytes.len(),
                track.format.container
            );
            Ok(track)
        }
    }
}

/// Байты тишины для PCM WAV заданной длительности, выровненные по блоку
fn wav_silence(layout: &WavLayout, silence_ms: u32) -> Vec<u8> {
    let fmt = &layout.fmt;
    if silence_ms == 0 || fmt.block_align == 0 || fmt.format_tag != 1 {
        return Vec::new();
    }
    let frames = fmt.sample_rate as u64 * silence_ms as u64 / 1000;
    let len = (frames * fmt.block_align as u64) as usize;
    // В 8-битном PCM нулевой уровень смещен к 0x80
    let fill = if fmt.bits_per_sample == 8 { 0x80 } else { 0 };
    vec![fill; len]
}

fn merge_wav(artifacts: &[AudioArtifact], config: &MergeConfig) -> Result<MergedTrack> {
    let layouts = artifacts
        .iter()
        .enumerate()
        .map(|(i, a)| {
            parse_wav(&a.bytes).map_err(|e| TtsMarkupError::InvalidFormat(format!("artifact {}: {}", i, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    let reference = &layouts[0];
    for (i, layout) in layouts.iter().enumerate().skip(1) {
        if !layout.fmt.is_compatible(&reference.fmt) {
            return Err(TtsMarkupError::FormatMismatch(format!(
                "artifact {}: {} Hz {} ch {}, expected {} Hz {} ch {}",
                i,
                layout.fmt.sample_rate,
                layout.fmt.channels,
                layout.fmt.encoding(),
                reference.fmt.sample_rate,
                reference.fmt.channels,
                reference.fmt.encoding()
            )));
        }
    }

    let silence = wav_silence(reference, config.silence_between_ms);
    let payload_len: usize = layouts.iter().map(|l| l.data.len()).sum::<usize>()
        + silence.len() * (layouts.len() - 1);

    let mut data = Vec::with_capacity(payload_len);
    for (i, (artifact, layout)) in artifacts.iter().zip(&layouts).enumerate() {
        if i > 0 {
            data.extend_from_slice(&silence);
        }
        data.extend_from_slice(&artifact.bytes[layout.data.clone()]);
    }

    let bytes = write_wav(&reference.fmt_body, &data)?;
    let format = AudioFormat::probe(&bytes);
    Ok(MergedTrack {
        bytes: Bytes::from(bytes),
        format,
    })
}

fn merge_mpeg(artifacts: &[AudioArtifact], config: &MergeConfig) -> Result<MergedTrack> {
    let expected = artifacts[0].format.sample_rate;
    for (i, artifact) in artifacts.iter().enumerate().skip(1) {
        if artifact.format.sample_rate != expected {
            return Err(TtsMarkupError::FormatMismatch(format!(
                "artifact {}: sample rate {:?}, expected {:?}",
                i, artifact.format.sample_rate, expected
            )));
        }
    }
    if config.silence_between_ms > 0 {
        log::debug!("Silence between parts is only inserted for PCM WAV, ignoring for MPEG audio");
    }

    let last = artifacts.len() - 1;
    let mut out = BytesMut::with_capacity(artifacts.iter().map(AudioArtifact::len).sum());
    for (i, artifact) in artifacts.iter().enumerate() {
        let mut part: &[u8] = &artifact.bytes;
        if i > 0 {
            part = &part[skip_id3v2(part)..];
        }
        if i < last {
            part = strip_id3v1(part);
        }
        out.extend_from_slice(part);
    }

    Ok(MergedTrack {
        bytes: out.freeze(),
        format: artifacts[0].format.clone(),
    })
}
