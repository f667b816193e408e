//! Split (multi-volume) archive support.
//!
//! A split archive is one logical byte stream cut into volume files of at
//! most `split_size` bytes:
//!
//! - `archive.z01` - disk 0, starting with the split marker signature
//! - `archive.z02` - disk 1
//! - ...
//! - `archive.zip` - the last disk, holding the end of central directory
//!
//! Headers record the 0-based disk their record starts on plus an offset
//! relative to that disk. No record signature ever straddles two volumes:
//! writers call [`DataSink::reserve_contiguous`](crate::io::DataSink::reserve_contiguous)
//! before each record, and [`SplitWriter`] moves to a fresh volume when the
//! record would not fit.
//!
//! # Reading
//!
//! ```rust,no_run
//! use std::io::Read;
//! use zipspan::volume::{SplitReader, SrcZip};
//!
//! # fn main() -> zipspan::Result<()> {
//! let src = SrcZip::open("archive.zip")?;
//! println!("archive spans {} disks", src.disk_count());
//!
//! let mut reader = SplitReader::new(&src);
//! reader.seek_disk(0, 4)?;
//! let mut first_record = [0u8; 30];
//! reader.read_exact(&mut first_record)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod reader;
mod writer;

pub use config::{MIN_SPLIT_SIZE, SplitConfig, volume_path};
pub use reader::{Disk, SplitReader, SrcZip};
pub use writer::SplitWriter;
