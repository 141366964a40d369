//! Reconstruction of the directory tree from decrypted PFS blocks.
//!
//! The walk visits the PFSC blocks in order: block 0 is the superblock,
//! the next blocks carry the inode table, and the remaining metadata
//! blocks carry directory entries. Directories are created on disk as
//! they are discovered, before any file extraction starts.

use crate::dirent::{self, Dirent};
use crate::inode::{Inode, INODE_SIZE};
use crate::pfsc::{self, BLOCK_SIZE, Pfsc};

use snafu::{ResultExt, Snafu, ensure};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Superblock offset of the filesystem object count.
const NDINODE_OFFSET: usize = 0x30;

/// Errors while walking the PFS metadata blocks.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum WalkError {
    #[snafu(display("cannot read metadata block #{block}"))]
    ReadBlockFailed {
        block: usize,
        source: pfsc::ReadBlockError,
    },

    #[snafu(display("directory entry name {name:?} escapes the output root"))]
    PathEscape { name: String },

    #[snafu(display("cannot create directory {}", path.display()))]
    CreateDirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

type Result<T, E = WalkError> = std::result::Result<T, E>;

/// One row of the virtual filesystem table, in traversal order.
#[derive(Debug, Clone)]
pub struct FsEntry {
    /// Entry name as raw bytes.
    pub name: Vec<u8>,
    /// Inode number; an index into [`Vfs::inodes`].
    pub inode: u32,
    /// Dirent type ([`Dirent::FILE`], [`Dirent::DIRECTORY`], ...).
    pub kind: u32,
}

/// The reconstructed filesystem: inode table, entry table and the
/// inode-to-output-path mapping.
#[must_use]
pub struct Vfs {
    inodes: Vec<Inode>,
    table: Vec<FsEntry>,
    paths: HashMap<u32, PathBuf>,
    ndinode: u32,
}

impl std::fmt::Debug for Vfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vfs")
            .field("inodes", &self.inodes.len())
            .field("entries", &self.table.len())
            .field("ndinode", &self.ndinode)
            .finish()
    }
}

impl Vfs {
    #[must_use]
    pub fn inodes(&self) -> &[Inode] {
        &self.inodes
    }

    #[must_use]
    pub fn table(&self) -> &[FsEntry] {
        &self.table
    }

    /// Object count from the superblock.
    #[must_use]
    pub fn ndinode(&self) -> u32 {
        self.ndinode
    }

    /// Output path assigned to an inode during the walk.
    #[must_use]
    pub fn path_of(&self, inode: u32) -> Option<&Path> {
        self.paths.get(&inode).map(PathBuf::as_path)
    }

    /// Regular files in traversal order, with their output paths.
    pub fn files(&self) -> impl Iterator<Item = (&FsEntry, &Path)> {
        self.table
            .iter()
            .filter(|e| e.kind == Dirent::FILE)
            .filter_map(|e| self.path_of(e.inode).map(|p| (e, p)))
    }
}

/// Walks the metadata blocks of `pfsc` and reconstructs the tree under
/// `anchor`, creating directories eagerly.
///
/// `anchor` is the resolved output root (the caller has already applied
/// the title-id redirect policy). Every path this produces stays under it;
/// a dirent that would break out fails the walk with
/// [`WalkError::PathEscape`].
pub fn walk(pfsc: &Pfsc, anchor: &Path) -> Result<Vfs> {
    let num_blocks = pfsc.block_count();

    let mut inodes: Vec<Inode> = Vec::new();
    let mut table: Vec<FsEntry> = Vec::new();
    let mut paths: HashMap<u32, PathBuf> = HashMap::new();

    let mut ndinode: u32 = 0;
    let mut counter: u32 = 0;
    let mut uroot_reached = false;
    let mut dinode_reached = false;
    let mut current_dir: Option<PathBuf> = None;

    let mut block = vec![0u8; BLOCK_SIZE];

    for i in 0..num_blocks {
        pfsc.read_block(i, &mut block)
            .context(ReadBlockFailedSnafu { block: i })?;

        if i == 0 {
            ndinode = u32::from_le_bytes(
                block[NDINODE_OFFSET..NDINODE_OFFSET + 4]
                    .try_into()
                    .unwrap(),
            );
            continue;
        }

        // Inode blocks immediately follow the superblock.
        let inode_blocks = (ndinode as usize * INODE_SIZE).div_ceil(BLOCK_SIZE);
        if i <= inode_blocks {
            let mut src = block.as_slice();
            while src.len() >= INODE_SIZE {
                let inode = match Inode::read(&mut src) {
                    Ok(v) => v,
                    Err(_) => break,
                };
                if inode.is_terminator() {
                    break;
                }
                inodes.push(inode);
            }
            continue;
        }

        // The uroot block names the super-root structures; its terminator
        // fixes the anchor for the first real directory.
        if block[0x10..0x1F] == *b"flat_path_table" {
            uroot_reached = true;
        }

        if uroot_reached {
            let mut off = 0;
            while off + dirent::DIRENT_HEADER_SIZE <= BLOCK_SIZE {
                let d = match Dirent::parse(&block[off..]) {
                    Ok(v) => v,
                    Err(_) => break,
                };

                if d.ino() != 0 {
                    counter += 1;
                    off += d.entsize();
                } else {
                    // The next counter value is the inode of the first
                    // directory block's "." entry.
                    paths.insert(counter, anchor.to_path_buf());
                    uroot_reached = false;
                    break;
                }
            }
        }

        // A block whose first two entries are "." and ".." starts the
        // directory entries proper.
        if block[0x10] == b'.' && block[0x28..0x2A] == *b".." {
            dinode_reached = true;
        }

        if dinode_reached {
            let mut end_reached = false;
            let mut off = 0;

            while off + dirent::DIRENT_HEADER_SIZE <= BLOCK_SIZE {
                let d = match Dirent::parse(&block[off..]) {
                    Ok(v) => v,
                    Err(dirent::ParseError::EndOfBlock) => break,
                    Err(e) => {
                        log::warn!("bad dirent in block #{i}: {e}");
                        break;
                    }
                };

                if d.ino() == 0 {
                    break;
                }

                table.push(FsEntry {
                    name: d.name().to_vec(),
                    inode: d.ino(),
                    kind: d.ty(),
                });

                match d.ty() {
                    Dirent::SELF => {
                        match paths.get(&d.ino()) {
                            Some(p) => current_dir = Some(p.clone()),
                            None => log::warn!("directory inode #{} has no path yet", d.ino()),
                        }
                    }
                    Dirent::PARENT => {}
                    Dirent::FILE | Dirent::DIRECTORY => {
                        let name = sanitize_name(d.name())?;
                        let dir = current_dir.as_deref().unwrap_or(anchor);
                        let path = dir.join(&name);

                        ensure!(
                            path.starts_with(anchor),
                            PathEscapeSnafu { name }
                        );

                        if d.ty() == Dirent::DIRECTORY {
                            std::fs::create_dir_all(&path)
                                .context(CreateDirFailedSnafu { path: path.clone() })?;
                        }

                        paths.insert(d.ino(), path);
                        counter += 1;

                        // One extra object for the root itself.
                        if counter + 1 == ndinode {
                            end_reached = true;
                            break;
                        }
                    }
                    other => log::warn!("dirent {:?} has unknown type {other}", d.name()),
                }

                off += d.entsize();
            }

            if end_reached {
                break;
            }
        }
    }

    Ok(Vfs {
        inodes,
        table,
        paths,
        ndinode,
    })
}

/// Validates a dirent name and renders it as a single path component.
///
/// Separators, NUL and dot-relative names are rejected outright; bytes
/// that are not valid UTF-8 are percent-escaped rather than refused.
fn sanitize_name(name: &[u8]) -> Result<String> {
    let printable = || String::from_utf8_lossy(name).into_owned();

    ensure!(
        !name.is_empty()
            && name != b"."
            && name != b".."
            && !name.iter().any(|&b| b == b'/' || b == b'\\' || b == 0),
        PathEscapeSnafu { name: printable() }
    );

    match std::str::from_utf8(name) {
        Ok(s) => Ok(s.to_owned()),
        Err(_) => {
            let mut out = String::with_capacity(name.len());
            for chunk in name.utf8_chunks() {
                out.push_str(chunk.valid());
                for &b in chunk.invalid() {
                    let _ = write!(out, "%{b:02X}");
                }
            }
            Ok(out)
        }
    }
}
