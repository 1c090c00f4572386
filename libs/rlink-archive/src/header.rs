use crate::record::put_u16;
use crate::record::put_u32;
use nom::bytes::complete::{tag, take};
use nom::combinator::map;
use nom::error::context;
use nom::number::complete::{be_u16, be_u32};
use rlink_reader::IResult;

pub const ARCHIVE_MAGIC: [u8; 4] = *b"RLCA";
pub const ARCHIVE_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 18;
const CHECKSUM_OFFSET: usize = 14;

// header {
//     u8  magic[4];
//     u16 version;
//     u8  runtime_config[4];
//     u32 entry_count;
//     u32 checksum;
// }
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ArchiveHeader {
	pub version: u16,
	pub config: [u8; 4],
	pub entry_count: u32,
	/// CRC32 of the whole file with this field left out.
	pub checksum: u32,
}

impl ArchiveHeader {
	pub fn parse(input: &[u8]) -> IResult<'_, ArchiveHeader> {
		let (input, _) = context("Magic", tag(&ARCHIVE_MAGIC[..]))(input)?;
		let (input, version) = context("Version", be_u16)(input)?;
		let (input, config) = context(
			"Runtime config",
			map(take(4usize), |bytes: &[u8]| {
				[bytes[0], bytes[1], bytes[2], bytes[3]]
			}),
		)(input)?;
		let (input, entry_count) = context("Entry count", be_u32)(input)?;
		let (input, checksum) = context("Checksum", be_u32)(input)?;

		Ok((
			input,
			ArchiveHeader {
				version,
				config,
				entry_count,
				checksum,
			},
		))
	}

	pub fn write(&self, output: &mut Vec<u8>) {
		output.extend_from_slice(&ARCHIVE_MAGIC);
		put_u16(output, self.version);
		output.extend_from_slice(&self.config);
		put_u32(output, self.entry_count);
		put_u32(output, self.checksum);
	}
}

/// The checksum stored in the header of `data`. `data` must be at least [`HEADER_LEN`] long.
pub fn archive_checksum(data: &[u8]) -> u32 {
	let mut hasher = crc32fast::Hasher::new();
	hasher.update(&data[..CHECKSUM_OFFSET]);
	hasher.update(&data[HEADER_LEN..]);
	hasher.finalize()
}

/// Writes the checksum of `data` into its header.
pub(crate) fn seal(data: &mut [u8]) {
	let checksum = archive_checksum(data);
	data[CHECKSUM_OFFSET..HEADER_LEN].copy_from_slice(&checksum.to_be_bytes());
}
