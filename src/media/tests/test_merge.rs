//! Тесты склейки аудиофрагментов
//!
//! WAV-фрагменты создаются через hound, результат читается им же.

use std::io::Cursor;
use crate::config::MergeConfig;
use crate::error::TtsMarkupError;
use crate::media::format::parse_wav;
use crate::media::{merge_artifacts, AudioArtifact, Container};

fn wav_artifact(sample_rate: u32, channels: u16, samples: &[i16]) -> AudioArtifact {
    let mut cursor = Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for s in samples {
        writer.write_sample(*s).unwrap();
    }
    writer.finalize().unwrap();
    AudioArtifact::from_bytes(cursor.into_inner())
}

fn read_samples(bytes: &[u8]) -> (hound::WavSpec, Vec<i16>) {
    let mut reader = hound::WavReader::new(Cursor::new(bytes.to_vec())).unwrap();
    let spec = reader.spec();
    let samples = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    (spec, samples)
}

/// MPEG1 Layer III, 44.1 kHz: заголовок кадра и немного "данных"
fn mp3_frame(fill: u8) -> Vec<u8> {
    let mut frame = vec![0xFF, 0xFB, 0x90, 0x44];
    frame.extend(std::iter::repeat(fill).take(12));
    frame
}

#[test]
fn test_single_artifact_is_byte_identical() {
    let artifact = wav_artifact(24_000, 1, &[1, 2, 3, 4, 5]);
    let track = merge_artifacts(&[artifact.clone()], &MergeConfig::default()).unwrap();
    assert_eq!(track.bytes, artifact.bytes);
    assert_eq!(track.format, artifact.format);
}

#[test]
fn test_wav_payloads_concatenate_under_one_header() {
    let parts = vec![
        wav_artifact(24_000, 1, &[1, 2, 3]),
        wav_artifact(24_000, 1, &[4, 5]),
        wav_artifact(24_000, 1, &[6, 7, 8, 9]),
    ];
    let payload_sum: usize = parts
        .iter()
        .map(|p| parse_wav(&p.bytes).unwrap().data.len())
        .sum();

    let track = merge_artifacts(&parts, &MergeConfig::default()).unwrap();

    let layout = parse_wav(&track.bytes).unwrap();
    assert_eq!(layout.data.len(), payload_sum);
    let riff_size = u32::from_le_bytes([track.bytes[4], track.bytes[5], track.bytes[6], track.bytes[7]]);
    assert_eq!(riff_size as usize, track.bytes.len() - 8);

    let (spec, samples) = read_samples(&track.bytes);
    assert_eq!(spec.sample_rate, 24_000);
    assert_eq!(samples, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(track.format.container, Container::Wav);
}

#[test]
fn test_wav_silence_between_parts() {
    let parts = vec![wav_artifact(1_000, 1, &[7, 7]), wav_artifact(1_000, 1, &[9])];
    let config = MergeConfig { silence_between_ms: 5 };

    let track = merge_artifacts(&parts, &config).unwrap();
    let (_, samples) = read_samples(&track.bytes);
    assert_eq!(samples, vec![7, 7, 0, 0, 0, 0, 0, 9]);
}

#[test]
fn test_wav_sample_rate_mismatch_is_fatal() {
    let parts = vec![wav_artifact(24_000, 1, &[1]), wav_artifact(16_000, 1, &[2])];
    let result = merge_artifacts(&parts, &MergeConfig::default());
    assert!(matches!(result, Err(TtsMarkupError::FormatMismatch(_))));
}

#[test]
fn test_wav_channel_mismatch_is_fatal() {
    let parts = vec![wav_artifact(24_000, 1, &[1, 1]), wav_artifact(24_000, 2, &[2, 2])];
    let result = merge_artifacts(&parts, &MergeConfig::default());
    assert!(matches!(result, Err(TtsMarkupError::FormatMismatch(_))));
}

#[test]
fn test_mixed_containers_are_rejected() {
    let parts = vec![wav_artifact(24_000, 1, &[1]), AudioArtifact::from_bytes(mp3_frame(0))];
    let result = merge_artifacts(&parts, &MergeConfig::default());
    assert!(matches!(result, Err(TtsMarkupError::FormatMismatch(_))));
}

#[test]
fn test_mp3_frames_append_and_tags_are_stripped() {
    let first = mp3_frame(1);

    let mut second = vec![b'I', b'D', b'3', 4, 0, 0, 0, 0, 0, 3, 0xA, 0xB, 0xC];
    second.extend(mp3_frame(2));
    let mut id3v1 = b"TAG".to_vec();
    id3v1.resize(128, b' ');
    second.extend(&id3v1);

    let third = mp3_frame(3);

    let parts: Vec<AudioArtifact> = [first.clone(), second, third.clone()]
        .into_iter()
        .map(AudioArtifact::from_bytes)
        .collect();
    let track = merge_artifacts(&parts, &MergeConfig::default()).unwrap();

    let mut expected = first;
    expected.extend(mp3_frame(2));
    expected.extend(third);
    assert_eq!(track.bytes.to_vec(), expected);
    assert_eq!(track.format.sample_rate, Some(44_100));
}

#[test]
fn test_mp3_sample_rate_mismatch_is_fatal() {
    // Второй кадр 48 kHz
    let parts = vec![
        AudioArtifact::from_bytes(mp3_frame(0)),
        AudioArtifact::from_bytes(vec![0xFF, 0xFB, 0x94, 0x44, 0, 0]),
    ];
    let result = merge_artifacts(&parts, &MergeConfig::default());
    assert!(matches!(result, Err(TtsMarkupError::FormatMismatch(_))));
}

#[test]
fn test_unknown_and_empty_inputs() {
    let parts = vec![AudioArtifact::from_bytes(&b"abc"[..]), AudioArtifact::from_bytes(&b"def"[..])];
    assert!(matches!(
        merge_artifacts(&parts, &MergeConfig::default()),
        Err(TtsMarkupError::InvalidFormat(_))
    ));
    assert!(matches!(
        merge_artifacts(&[], &MergeConfig::default()),
        Err(TtsMarkupError::NothingToMerge)
    ));
}
