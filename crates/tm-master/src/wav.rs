//! WAV encoding for rendered output.
//!
//! Integer formats are written as plain PCM, `F32` as IEEE float. Sample
//! bytes come straight from `Player::read`, which already produces the
//! little-endian layout WAV expects.

use std::io::{self, Seek, SeekFrom, Write};

use tm_engine::SampleFormat;

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

/// Size of the header written by [`write_header`].
pub const HEADER_LEN: usize = 44;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
}

impl WavSpec {
    pub fn block_align(&self) -> u16 {
        self.channels * self.format.bytes_per_sample() as u16
    }

    fn format_tag(&self) -> u16 {
        if self.format.is_float() {
            FORMAT_IEEE_FLOAT
        } else {
            FORMAT_PCM
        }
    }
}

/// Write a complete header for `data_len` bytes of sample data.
pub fn write_header(w: &mut impl Write, spec: &WavSpec, data_len: u32) -> io::Result<()> {
    let block_align = spec.block_align();
    w.write_all(b"RIFF")?;
    w.write_all(&(36u32.saturating_add(data_len)).to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&spec.format_tag().to_le_bytes())?;
    w.write_all(&spec.channels.to_le_bytes())?;
    w.write_all(&spec.sample_rate.to_le_bytes())?;
    w.write_all(&(spec.sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&(spec.format.bits() as u16).to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&data_len.to_le_bytes())
}

/// Encode `data` as a WAV file in memory.
pub fn to_wav(spec: &WavSpec, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + data.len());
    // Writes into a Vec cannot fail
    let _ = write_header(&mut buf, spec, data.len() as u32);
    buf.extend_from_slice(data);
    buf
}

/// Streams sample data to a seekable writer and patches the header sizes
/// on [`WavWriter::finish`].
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    spec: WavSpec,
    data_len: u32,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(mut inner: W, spec: WavSpec) -> io::Result<Self> {
        write_header(&mut inner, &spec, 0)?;
        Ok(Self {
            inner,
            spec,
            data_len: 0,
        })
    }

    pub fn write_samples(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data)?;
        self.data_len = self.data_len.saturating_add(data.len() as u32);
        Ok(())
    }

    /// Bytes of sample data written so far.
    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.inner.seek(SeekFrom::Start(0))?;
        write_header(&mut self.inner, &self.spec, self.data_len)?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u16_at(b: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([b[at], b[at + 1]])
    }

    fn u32_at(b: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
    }

    fn spec(format: SampleFormat) -> WavSpec {
        WavSpec {
            sample_rate: 44100,
            channels: 2,
            format,
        }
    }

    #[test]
    fn pcm16_header_fields() {
        let wav = to_wav(&spec(SampleFormat::S16), &[0; 400]);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), 36 + 400);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u16_at(&wav, 20), FORMAT_PCM);
        assert_eq!(u16_at(&wav, 22), 2);
        assert_eq!(u32_at(&wav, 24), 44100);
        assert_eq!(u32_at(&wav, 28), 44100 * 4);
        assert_eq!(u16_at(&wav, 32), 4);
        assert_eq!(u16_at(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 400);
        assert_eq!(wav.len(), HEADER_LEN + 400);
    }

    #[test]
    fn every_format_has_its_depth() {
        for (format, bits, tag) in [
            (SampleFormat::U8, 8, FORMAT_PCM),
            (SampleFormat::S24, 24, FORMAT_PCM),
            (SampleFormat::S32, 32, FORMAT_PCM),
            (SampleFormat::F32, 32, FORMAT_IEEE_FLOAT),
        ] {
            let wav = to_wav(&spec(format), &[]);
            assert_eq!(u16_at(&wav, 34), bits);
            assert_eq!(u16_at(&wav, 20), tag);
            assert_eq!(u16_at(&wav, 32), 2 * bits / 8);
        }
    }

    #[test]
    fn streaming_writer_patches_sizes() {
        let mut w = WavWriter::new(Cursor::new(Vec::new()), spec(SampleFormat::S16)).unwrap();
        w.write_samples(&[1; 100]).unwrap();
        w.write_samples(&[2; 60]).unwrap();
        let wav = w.finish().unwrap().into_inner();
        assert_eq!(u32_at(&wav, 40), 160);
        assert_eq!(u32_at(&wav, 4), 36 + 160);
        assert_eq!(wav.len(), HEADER_LEN + 160);
        assert_eq!(wav[HEADER_LEN + 100], 2);
    }
}
