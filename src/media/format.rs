//! Распознавание формата аудиофрагментов
//!
//! Поддерживаются два контейнера: RIFF/WAVE (заголовок с полями размеров)
//! и поток кадров MPEG audio (самоограничивающиеся кадры, опционально с ID3).

use std::io::{Cursor, Read, Write};
use std::ops::Range;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use serde::Serialize;
use crate::error::{Result, TtsMarkupError};

/// Тип контейнера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Wav,
    Mp3,
    Unknown,
}

impl Container {
    /// Расширение файла для контейнера
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Unknown => "bin",
        }
    }
}

/// Метаданные формата аудио
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    pub container: Container,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub encoding: Option<String>,
}

impl AudioFormat {
    pub fn unknown() -> Self {
        Self {
            container: Container::Unknown,
            sample_rate: None,
            channels: None,
            encoding: None,
        }
    }

    /// Определить формат по первым байтам
    pub fn probe(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return match parse_wav(bytes) {
                Ok(layout) => Self {
                    container: Container::Wav,
                    sample_rate: Some(layout.fmt.sample_rate),
                    channels: Some(layout.fmt.channels),
                    encoding: Some(layout.fmt.encoding()),
                },
                Err(_) => Self {
                    container: Container::Wav,
                    ..Self::unknown()
                },
            };
        }

        let frame_start = skip_id3v2(bytes);
        if let Some(header) = bytes.get(frame_start..).and_then(MpegFrameHeader::parse) {
            return Self {
                container: Container::Mp3,
                sample_rate: Some(header.sample_rate),
                channels: Some(header.channels),
                encoding: Some(header.encoding()),
            };
        }
        if bytes.starts_with(b"ID3") {
            return Self {
                container: Container::Mp3,
                ..Self::unknown()
            };
        }

        Self::unknown()
    }
}

/// Аудиофрагмент, полученный от движка для одного чанка
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub bytes: Bytes,
    pub format: AudioFormat,
}

impl AudioArtifact {
    /// Создать фрагмент, определив формат по содержимому
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let format = AudioFormat::probe(&bytes);
        Self { bytes, format }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Содержимое чанка `fmt ` файла WAVE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavFmt {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl WavFmt {
    /// Строковое имя кодировки, например `pcm_s16le`
    pub fn encoding(&self) -> String {
        match self.format_tag {
            1 if self.bits_per_sample == 8 => "pcm_u8".to_string(),
            1 => format!("pcm_s{}le", self.bits_per_sample),
            3 => format!("pcm_f{}le", self.bits_per_sample),
            6 => "alaw".to_string(),
            7 => "mulaw".to_string(),
            0xFFFE => format!("extensible_{}bit", self.bits_per_sample),
            other => format!("wav_tag_{:#06x}", other),
        }
    }

    /// Совместимы ли параметры для склейки без перекодирования
    pub fn is_compatible(&self, other: &WavFmt) -> bool {
        self.format_tag == other.format_tag
            && self.channels == other.channels
            && self.sample_rate == other.sample_rate
            && self.bits_per_sample == other.bits_per_sample
            && self.block_align == other.block_align
    }
}

/// Разметка файла WAVE: параметры, сырой `fmt ` и диапазон полезных данных
#[derive(Debug, Clone)]
pub struct WavLayout {
    pub fmt: WavFmt,
    pub fmt_body: Vec<u8>,
    pub data: Range<usize>,
}

/// Разобрать структуру RIFF/WAVE.
///
/// Если поле размера `data` больше фактического остатка (потоковая запись
/// с заглушкой), данными считается все до конца буфера.
pub fn parse_wav(bytes: &[u8]) -> Result<WavLayout> {
    let mut cursor = Cursor::new(bytes);
    let mut tag = [0u8; 4];

    cursor.read_exact(&mut tag)?;
    if &tag != b"RIFF" {
        return Err(TtsMarkupError::InvalidFormat("missing RIFF header".to_string()));
    }
    let _riff_size = cursor.read_u32::<LittleEndian>()?;
    cursor.read_exact(&mut tag)?;
    if &tag != b"WAVE" {
        return Err(TtsMarkupError::InvalidFormat("RIFF container is not WAVE".to_string()));
    }

    let mut fmt: Option<(WavFmt, Vec<u8>)> = None;
    let total = bytes.len() as u64;

    while cursor.position() + 8 <= total {
        cursor.read_exact(&mut tag)?;
        let size = cursor.read_u32::<LittleEndian>()? as u64;
        let start = cursor.position();
        let remaining = total - start;

        match &tag {
            b"fmt " => {
                if size < 16 || size > remaining {
                    return Err(TtsMarkupError::InvalidFormat(format!("bad fmt chunk size {}", size)));
                }
                let body = bytes[start as usize..(start + size) as usize].to_vec();
                let mut fields = Cursor::new(&body[..]);
                let parsed = WavFmt {
                    format_tag: fields.read_u16::<LittleEndian>()?,
                    channels: fields.read_u16::<LittleEndian>()?,
                    sample_rate: fields.read_u32::<LittleEndian>()?,
                    byte_rate: fields.read_u32::<LittleEndian>()?,
                    block_align: fields.read_u16::<LittleEndian>()?,
                    bits_per_sample: fields.read_u16::<LittleEndian>()?,
                };
                fmt = Some((parsed, body));
            }
            b"data" => {
                let Some((fmt, fmt_body)) = fmt else {
                    return Err(TtsMarkupError::InvalidFormat("data chunk before fmt chunk".to_string()));
                };
                let size = size.min(remaining);
                return Ok(WavLayout {
                    fmt,
                    fmt_body,
                    data: start as usize..(start + size) as usize,
                });
            }
            _ => {}
        }

        // Чанки RIFF выравниваются на четную границу
        cursor.set_position(start + size + (size & 1));
    }

    Err(TtsMarkupError::InvalidFormat("WAVE file has no data chunk".to_string()))
}

/// Записать минимальный WAVE: `fmt ` с заданным телом и один `data`
pub fn write_wav(fmt_body: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let fmt_pad = fmt_body.len() & 1;
    let data_pad = data.len() & 1;
    let riff_size = 4 + (8 + fmt_body.len() + fmt_pad) + (8 + data.len() + data_pad);
    let riff_size = u32::try_from(riff_size)
        .map_err(|_| TtsMarkupError::InvalidFormat(format!("merged WAVE too large: {} bytes", riff_size)))?;

    let mut out = Vec::with_capacity(riff_size as usize + 8);
    out.write_all(b"RIFF")?;
    out.write_u32::<LittleEndian>(riff_size)?;
    out.write_all(b"WAVE")?;

    out.write_all(b"fmt ")?;
    out.write_u32::<LittleEndian>(fmt_body.len() as u32)?;
    out.write_all(fmt_body)?;
    if fmt_pad == 1 {
        out.write_u8(0)?;
    }

    out.write_all(b"data")?;
    out.write_u32::<LittleEndian>(data.len() as u32)?;
    out.write_all(data)?;
    if data_pad == 1 {
        out.write_u8(0)?;
    }
    Ok(out)
}

/// Заголовок кадра MPEG audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpegFrameHeader {
    pub version: MpegVersion,
    pub layer: u8,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

impl MpegFrameHeader {
    /// Разобрать 4-байтный заголовок кадра в начале `bytes`
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header = bytes.get(0..4)?;
        if header[0] != 0xFF || header[1] & 0xE0 != 0xE0 {
            return None;
        }

        let version = match (header[1] >> 3) & 0b11 {
            0b00 => MpegVersion::Mpeg25,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return None,
        };
        let layer = match (header[1] >> 1) & 0b11 {
            0b01 => 3,
            0b10 => 2,
            0b11 => 1,
            _ => return None,
        };
        if header[2] >> 4 == 0b1111 {
            return None;
        }
        let rates = match version {
            MpegVersion::Mpeg1 => [44_100, 48_000, 32_000],
            MpegVersion::Mpeg2 => [22_050, 24_000, 16_000],
            MpegVersion::Mpeg25 => [11_025, 12_000, 8_000],
        };
        let sample_rate = *rates.get(((header[2] >> 2) & 0b11) as usize)?;
        let channels = if header[3] >> 6 == 0b11 { 1 } else { 2 };

        Some(Self {
            version,
            layer,
            sample_rate,
            channels,
        })
    }

    pub fn encoding(&self) -> String {
        let version = match self.version {
            MpegVersion::Mpeg1 => "mpeg1",
            MpegVersion::Mpeg2 => "mpeg2",
            MpegVersion::Mpeg25 => "mpeg2.5",
        };
        format!("{}_layer{}", version, self.layer)
    }
}

/// Смещение после тега ID3v2 (0, если тега нет)
pub fn skip_id3v2(bytes: &[u8]) -> usize {
    if bytes.len() < 10 || !bytes.starts_with(b"ID3") {
        return 0;
    }
    // Размер тега записан как synchsafe integer: 4 байта по 7 бит
    let size = bytes[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b & 0x7F) as usize);
    let footer = if bytes[5] & 0x10 != 0 { 10 } else { 0 };
    (10 + size + footer).min(bytes.len())
}

/// Длина потока без завершающего тега ID3v1
pub fn strip_id3v1(bytes: &[u8]) -> &[u8] {
    if bytes.len() >= 128 && &bytes[bytes.len() - 128..bytes.len() - 125] == b"TAG" {
        &bytes[..bytes.len() - 128]
    } else {
        bytes
    }
}
