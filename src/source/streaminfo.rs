use byteorder::{BigEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::{FingerprintSource, SourceError, SourceKind};
use crate::fingerprint::{Fingerprint, FINGERPRINT_LEN};

pub const FLAC_MAGIC: &[u8; 4] = b"fLaC";
/// Fixed size of a STREAMINFO body.
pub const STREAMINFO_LEN: u32 = 34;

const ID3_MAGIC: &[u8; 3] = b"ID3";
const BLOCK_STREAMINFO: u8 = 0;
const LAST_BLOCK_FLAG: u8 = 0x80;
/// Offset of the MD5 inside the STREAMINFO body.
const MD5_OFFSET: usize = 18;

/// Reads fingerprints straight out of the FLAC metadata header.
pub struct StreamInfoSource;

impl FingerprintSource for StreamInfoSource {
    fn kind(&self) -> SourceKind { SourceKind::StreamInfo }

    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, SourceError> {
        let f = File::open(path)?;
        read_streaminfo_md5(BufReader::new(f))
    }
}

/// Parse a FLAC stream header and return the STREAMINFO MD5.
///
/// A leading ID3v2 tag is skipped.  Only the metadata blocks are read; audio
/// frames are never touched.
pub fn read_streaminfo_md5<R: Read>(mut reader: R) -> Result<Fingerprint, SourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(eof_as(SourceError::NotFlac))?;

    if &magic[..3] == ID3_MAGIC {
        skip_id3v2(&mut reader)?;
        reader.read_exact(&mut magic).map_err(eof_as(SourceError::NotFlac))?;
    }
    if &magic != FLAC_MAGIC {
        return Err(SourceError::NotFlac);
    }

    loop {
        let header = reader.read_u8().map_err(eof_as(SourceError::MissingStreamInfo))?;
        let length = reader.read_u24::<BigEndian>().map_err(eof_as(SourceError::Truncated))?;

        if (header & !LAST_BLOCK_FLAG) == BLOCK_STREAMINFO {
            if length < STREAMINFO_LEN {
                return Err(SourceError::ShortStreamInfo(length));
            }
            let mut body = [0u8; STREAMINFO_LEN as usize];
            reader.read_exact(&mut body).map_err(eof_as(SourceError::Truncated))?;
            let mut md5 = [0u8; FINGERPRINT_LEN];
            md5.copy_from_slice(&body[MD5_OFFSET..MD5_OFFSET + FINGERPRINT_LEN]);
            return Ok(Fingerprint::from_bytes(md5));
        }
        if header & LAST_BLOCK_FLAG != 0 {
            return Err(SourceError::MissingStreamInfo);
        }
        skip(&mut reader, length as u64)?;
    }
}

/// The marker and major version byte have already been consumed.
fn skip_id3v2<R: Read>(reader: &mut R) -> Result<(), SourceError> {
    // Remaining header: minor version, flags, 4-byte syncsafe size.
    let _minor = reader.read_u8().map_err(eof_as(SourceError::NotFlac))?;
    let flags  = reader.read_u8().map_err(eof_as(SourceError::NotFlac))?;
    let mut size_bytes = [0u8; 4];
    reader.read_exact(&mut size_bytes).map_err(eof_as(SourceError::NotFlac))?;
    let mut size = size_bytes
        .iter()
        .fold(0u64, |acc, b| (acc << 7) | u64::from(b & 0x7f));
    if flags & 0x10 != 0 {
        size += 10; // footer
    }
    skip(reader, size)
}

fn skip<R: Read>(reader: &mut R, n: u64) -> Result<(), SourceError> {
    let copied = io::copy(&mut reader.by_ref().take(n), &mut io::sink())?;
    if copied < n {
        return Err(SourceError::Truncated);
    }
    Ok(())
}

fn eof_as(kind: SourceError) -> impl FnOnce(io::Error) -> SourceError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof { kind } else { SourceError::Io(e) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn block(block_type: u8, last: bool, body: &[u8]) -> Vec<u8> {
        let mut v = vec![block_type | if last { LAST_BLOCK_FLAG } else { 0 }];
        let len = body.len() as u32;
        v.extend_from_slice(&len.to_be_bytes()[1..]);
        v.extend_from_slice(body);
        v
    }

    fn streaminfo(md5: [u8; 16]) -> Vec<u8> {
        let mut body = vec![0u8; MD5_OFFSET];
        body.extend_from_slice(&md5);
        body
    }

    #[test]
    fn reads_md5_from_first_block() {
        let md5 = [0xab; 16];
        let mut data = FLAC_MAGIC.to_vec();
        data.extend(block(BLOCK_STREAMINFO, true, &streaminfo(md5)));
        data.extend_from_slice(&[0xff, 0xf8, 0x00]); // start of a frame
        let fp = read_streaminfo_md5(Cursor::new(data)).unwrap();
        assert_eq!(fp, Fingerprint::from_bytes(md5));
    }

    #[test]
    fn skips_id3_and_foreign_blocks() {
        let md5 = [0x11; 16];
        let mut data = b"ID3\x04\x00\x00".to_vec();
        data.extend_from_slice(&[0, 0, 0, 5]); // syncsafe size 5
        data.extend_from_slice(b"xxxxx");
        data.extend_from_slice(FLAC_MAGIC);
        data.extend(block(4, false, b"vorbis comment"));
        data.extend(block(BLOCK_STREAMINFO, true, &streaminfo(md5)));
        let fp = read_streaminfo_md5(Cursor::new(data)).unwrap();
        assert_eq!(fp, Fingerprint::from_bytes(md5));
    }

    #[test]
    fn zero_md5_comes_back_unset() {
        let mut data = FLAC_MAGIC.to_vec();
        data.extend(block(BLOCK_STREAMINFO, true, &streaminfo([0; 16])));
        assert!(read_streaminfo_md5(Cursor::new(data)).unwrap().is_unset());
    }

    #[test]
    fn rejects_non_flac() {
        let err = read_streaminfo_md5(Cursor::new(b"RIFF....WAVE".to_vec())).unwrap_err();
        assert!(matches!(err, SourceError::NotFlac));
        let err = read_streaminfo_md5(Cursor::new(b"fL".to_vec())).unwrap_err();
        assert!(matches!(err, SourceError::NotFlac));
    }

    #[test]
    fn reports_missing_and_short_streaminfo() {
        let mut data = FLAC_MAGIC.to_vec();
        data.extend(block(1, true, &[0u8; 8]));
        assert!(matches!(
            read_streaminfo_md5(Cursor::new(data)).unwrap_err(),
            SourceError::MissingStreamInfo
        ));

        let mut data = FLAC_MAGIC.to_vec();
        data.extend(block(BLOCK_STREAMINFO, true, &[0u8; 10]));
        assert!(matches!(
            read_streaminfo_md5(Cursor::new(data)).unwrap_err(),
            SourceError::ShortStreamInfo(10)
        ));
    }

    #[test]
    fn truncated_body_is_reported() {
        let mut data = FLAC_MAGIC.to_vec();
        data.extend(block(BLOCK_STREAMINFO, true, &streaminfo([1; 16])));
        data.truncate(data.len() - 4);
        assert!(matches!(
            read_streaminfo_md5(Cursor::new(data)).unwrap_err(),
            SourceError::Truncated
        ));
    }
}
