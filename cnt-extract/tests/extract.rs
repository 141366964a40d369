//! End-to-end extraction tests over synthetic PKG files.
//!
//! The fixture builder assembles a complete PKG: an entry table whose
//! key entries are RSA/CBC-wrapped under the embedded keysets, and an
//! XTS-encrypted PFS image carrying a PFSC substream with raw and
//! zlib-deflated blocks.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncryptMut, KeyInit, KeyIvInit};
use cnt_extract::{PkgExtractor, SilentProgress};
use cnt_pfs::crypto::XTS_SECTOR_SIZE;
use cnt_pfs::derive_xts_keys;
use sha2::Digest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use xts_mode::{Xts128, get_tweak_default};

const BLOCK: usize = 0x10000;

const PFS_OFFSET: u64 = 0x10000;
const PFS_SIZE: u64 = 0xB0000;
const PKG_SIZE: u64 = 0xC0000;
const PFSC_OFFSET: u64 = 0x20000;

const DK3: [u8; 32] = [0x5A; 32];
const EKPFS: [u8; 32] = [0xC3; 32];
const SEED: [u8; 16] = [
    0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xAB, 0xAC, 0xAD, 0xAE,
    0xAF,
];

const NP_PLAINTEXT: &[u8; 32] = b"NPTITLE-TEST-PAYLOAD-0123456789A";

const FILE_A_SIZE: u64 = 0x12345;
const FILE_C_SIZE: u64 = 5000;

fn file_c_pattern() -> Vec<u8> {
    (0..BLOCK).map(|i| (i % 251) as u8).collect()
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
}

fn put_u64(buf: &mut [u8], at: usize, v: u64) {
    buf[at..at + 8].copy_from_slice(&v.to_be_bytes());
}

/// Builds the 32-byte on-disk entry record.
fn entry_record(id: u32, offset: u32, size: u32) -> [u8; 32] {
    let mut rec = [0u8; 32];
    put_u32(&mut rec, 0, id);
    put_u32(&mut rec, 16, offset);
    put_u32(&mut rec, 20, size);
    rec
}

fn rsa_wrap(key: &rsa::RsaPublicKey, plain: &[u8]) -> [u8; 256] {
    let mut rng = rand::thread_rng();
    key.encrypt(&mut rng, rsa::Pkcs1v15Encrypt, plain)
        .unwrap()
        .try_into()
        .unwrap()
}

fn cbc_encrypt(iv_key: &[u8; 32], plain: &[u8]) -> Vec<u8> {
    let (iv, key) = iv_key.split_at(16);
    let mut enc = cbc::Encryptor::<Aes128>::new(
        GenericArray::from_slice(key),
        GenericArray::from_slice(iv),
    );
    let mut out = plain.to_vec();
    for chunk in out.chunks_exact_mut(16) {
        enc.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
    out
}

fn entry_iv(record: &[u8; 32]) -> [u8; 32] {
    let mut sha = sha2::Sha256::new();
    sha.update(record);
    sha.update(DK3);
    sha.finalize().into()
}

fn deflate(data: &[u8]) -> Vec<u8> {
    use flate2::{Compress, Compression, FlushCompress};
    let mut out = vec![0u8; data.len() + 1024];
    let mut c = Compress::new(Compression::default(), true);
    c.compress(data, &mut out, FlushCompress::Finish).unwrap();
    out.truncate(c.total_out() as usize);
    out
}

fn put_dirent(block: &mut [u8], at: usize, ino: u32, ty: u32, name: &[u8], entsize: u32) {
    block[at..at + 4].copy_from_slice(&ino.to_le_bytes());
    block[at + 4..at + 8].copy_from_slice(&ty.to_le_bytes());
    block[at + 8..at + 12].copy_from_slice(&(name.len() as u32).to_le_bytes());
    block[at + 12..at + 16].copy_from_slice(&entsize.to_le_bytes());
    block[at + 16..at + 16 + name.len()].copy_from_slice(name);
}

fn put_inode(block: &mut [u8], slot: usize, mode: u16, size: u64, blocks: u32, loc: u32) {
    let at = slot * 0xA8;
    block[at..at + 2].copy_from_slice(&mode.to_le_bytes());
    block[at + 0x08..at + 0x10].copy_from_slice(&size.to_le_bytes());
    block[at + 0x60..at + 0x64].copy_from_slice(&blocks.to_le_bytes());
    block[at + 0x64..at + 0x68].copy_from_slice(&loc.to_le_bytes());
}

/// Builds the plaintext PFSC substream; `file_a_name` lets tests inject a
/// hostile dirent.
fn build_pfsc(file_a_name: &[u8]) -> Vec<u8> {
    let file_c_packed = deflate(&file_c_pattern());
    assert!(file_c_packed.len() < BLOCK);

    // Blocks 0-6 are stored raw and consecutively; block 7 is deflated.
    let num_blocks = 8usize;
    let data_base = 0x10000u64;
    let mut pfsc = vec![0u8; data_base as usize + 7 * BLOCK + file_c_packed.len()];

    // Header.
    pfsc[0..4].copy_from_slice(&0x43534650u32.to_le_bytes());
    pfsc[0x0C..0x10].copy_from_slice(&(BLOCK as u32).to_le_bytes());
    pfsc[0x10..0x18].copy_from_slice(&(BLOCK as u64).to_le_bytes());
    pfsc[0x18..0x20].copy_from_slice(&0x40u64.to_le_bytes());
    pfsc[0x20..0x28].copy_from_slice(&data_base.to_le_bytes());
    pfsc[0x28..0x30].copy_from_slice(&((num_blocks * BLOCK) as u64).to_le_bytes());

    // Sector map: blocks 0-6 raw, block 7 deflated.
    let mut map: Vec<u64> = (0..num_blocks as u64)
        .map(|i| data_base + i * BLOCK as u64)
        .collect();
    map.push(data_base + 7 * BLOCK as u64 + file_c_packed.len() as u64);
    for (i, off) in map.iter().enumerate() {
        pfsc[0x40 + i * 8..0x48 + i * 8].copy_from_slice(&off.to_le_bytes());
    }

    let block_at = |i: usize| (data_base as usize) + i * BLOCK;

    // Block 0: superblock.
    pfsc[block_at(0) + 0x30..block_at(0) + 0x34].copy_from_slice(&5u32.to_le_bytes());

    // Block 1: inode table.
    {
        let b = &mut pfsc[block_at(1)..block_at(1) + BLOCK];
        put_inode(b, 0, 0x8000, 0, 0, 0); // flat_path_table
        put_inode(b, 1, 0x4000, BLOCK as u64, 1, 3); // root
        put_inode(b, 2, 0x8000, FILE_A_SIZE, 2, 5); // fileA
        put_inode(b, 3, 0x4000, BLOCK as u64, 1, 4); // subdir
        put_inode(b, 4, 0x8000, FILE_C_SIZE, 1, 7); // fileC
    }

    // Block 2: uroot.
    {
        let b = &mut pfsc[block_at(2)..block_at(2) + BLOCK];
        put_dirent(b, 0, 1, 2, b"flat_path_table", 0x28);
        put_dirent(b, 0x28, 0, 0, b"", 0x18);
    }

    // Block 3: root directory.
    {
        let b = &mut pfsc[block_at(3)..block_at(3) + BLOCK];
        put_dirent(b, 0, 1, 4, b".", 0x18);
        put_dirent(b, 0x18, 1, 5, b"..", 0x18);
        let ent_a = ((16 + file_a_name.len() + 7) & !7) as u32;
        put_dirent(b, 0x30, 2, 2, file_a_name, ent_a);
        let at = 0x30 + ent_a as usize;
        put_dirent(b, at, 3, 3, b"subdir", 0x20);
        put_dirent(b, at + 0x20, 0, 0, b"", 0x18);
    }

    // Block 4: subdir directory.
    {
        let b = &mut pfsc[block_at(4)..block_at(4) + BLOCK];
        put_dirent(b, 0, 3, 4, b".", 0x18);
        put_dirent(b, 0x18, 1, 5, b"..", 0x18);
        put_dirent(b, 0x30, 4, 2, b"fileC.bin", 0x20);
        put_dirent(b, 0x50, 0, 0, b"", 0x18);
    }

    // Blocks 5-6: fileA data (raw).
    pfsc[block_at(5)..block_at(7)].fill(0xAA);

    // Block 7: fileC data (deflated).
    pfsc[block_at(7)..block_at(7) + file_c_packed.len()].copy_from_slice(&file_c_packed);

    pfsc
}

/// Assembles a complete PKG file on disk and returns its path.
fn build_pkg(dir: &Path, file_a_name: &[u8]) -> PathBuf {
    let mut pkg = vec![0u8; PKG_SIZE as usize];

    // --- Entry payloads ---

    let rec_keys = entry_record(0x10, 0x2000, 2048);
    let rec_imgkey = entry_record(0x20, 0x2800, 256);
    let rec_sfo = entry_record(0x1000, 0x2A00, 12);
    let rec_icon = entry_record(0x1200, 0x2B00, 4);
    let rec_unknown = entry_record(0x9999, 0x2C00, 2);
    let rec_np = entry_record(0x402, 0x2D00, 32);

    // Entry 0x10: seed digest + 7 digests + 7 RSA blobs, slot 3 wraps DK3.
    let key3 = rsa_wrap(&cnt_pkg::keys::dk3_public_key(), &DK3);
    pkg[0x2000 + 32 + 7 * 32 + 3 * 256..0x2000 + 32 + 7 * 32 + 4 * 256].copy_from_slice(&key3);

    // Entry 0x20: EKPFS, RSA-wrapped then CBC-encrypted under the entry IV.
    let image_key_plain = rsa_wrap(&cnt_pkg::keys::pkg_public_key(), &EKPFS);
    let imgkeydata = cbc_encrypt(&entry_iv(&rec_imgkey), &image_key_plain);
    pkg[0x2800..0x2900].copy_from_slice(&imgkeydata);

    pkg[0x2A00..0x2A0C].copy_from_slice(b"SFOTESTDATA\n");
    pkg[0x2B00..0x2B04].copy_from_slice(b"PNG\0");
    pkg[0x2C00..0x2C02].copy_from_slice(b"XX");

    let np_cipher = cbc_encrypt(&entry_iv(&rec_np), NP_PLAINTEXT);
    pkg[0x2D00..0x2D20].copy_from_slice(&np_cipher);

    // --- Entry table ---

    let records = [
        rec_keys,
        rec_imgkey,
        rec_sfo,
        rec_icon,
        rec_unknown,
        rec_np,
    ];
    for (i, rec) in records.iter().enumerate() {
        pkg[0x1000 + i * 32..0x1020 + i * 32].copy_from_slice(rec);
    }

    // --- Header ---

    put_u32(&mut pkg, 0x000, 0x7F434E54);
    put_u32(&mut pkg, 0x010, records.len() as u32);
    put_u32(&mut pkg, 0x018, 0x1000); // table offset
    put_u64(&mut pkg, 0x030, 0x2000); // content offset
    put_u64(&mut pkg, 0x038, 0x1000); // content size
    pkg[0x040..0x064].copy_from_slice(b"UP0000-CUSA00001_00-TESTPKG000000000");
    put_u64(&mut pkg, 0x410, PFS_OFFSET);
    put_u64(&mut pkg, 0x418, PFS_SIZE);
    put_u64(&mut pkg, 0x430, PKG_SIZE);
    put_u32(&mut pkg, 0x43C, (PFS_SIZE / 2) as u32); // pfs cache size

    // --- PFS image ---

    let pfs = &mut pkg[PFS_OFFSET as usize..(PFS_OFFSET + PFS_SIZE) as usize];
    pfs[0x370..0x380].copy_from_slice(&SEED);

    let pfsc = build_pfsc(file_a_name);
    assert!(PFSC_OFFSET as usize + pfsc.len() <= pfs.len());
    pfs[PFSC_OFFSET as usize..PFSC_OFFSET as usize + pfsc.len()].copy_from_slice(&pfsc);

    // Encrypt every sector from the PFSC base onward, indexed from the
    // image start.
    let (data_key, tweak_key) = derive_xts_keys(&EKPFS, &SEED);
    let xts = Xts128::new(
        Aes128::new((&data_key).into()),
        Aes128::new((&tweak_key).into()),
    );
    let first_sector = (PFSC_OFFSET as usize) / XTS_SECTOR_SIZE;
    for (i, sector) in pfs[PFSC_OFFSET as usize..]
        .chunks_exact_mut(XTS_SECTOR_SIZE)
        .enumerate()
    {
        xts.encrypt_sector(sector, get_tweak_default((first_sector + i) as u128));
    }

    let path = dir.join("test.pkg");
    std::fs::write(&path, &pkg).unwrap();
    path
}

fn read(path: impl AsRef<Path>) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

/// Collects every file under `root` as (relative path, contents).
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn visit(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if path.is_dir() {
                visit(root, &path, out);
            } else {
                out.insert(path.strip_prefix(root).unwrap().to_path_buf(), read(&path));
            }
        }
    }

    let mut out = BTreeMap::new();
    visit(root, root, &mut out);
    out
}

#[test]
fn extracts_synthetic_pkg_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let pkg_path = build_pkg(tmp.path(), b"fileA.bin");
    let out = tmp.path().join("CUSA00001");

    let pkg = cnt_extract::open_pkg(&pkg_path).unwrap();

    assert_eq!(pkg.header().content_id().title_id(), "CUSA00001");
    assert_eq!(pkg.session().dk3(), Some(&DK3));
    assert_eq!(pkg.session().ekpfs().unwrap(), &EKPFS);
    assert_eq!(pkg.param_sfo(), Some(&b"SFOTESTDATA\n"[..]));

    PkgExtractor::new(&pkg, &pkg_path, SilentProgress, false)
        .with_threads(Some(2))
        .extract(&out)
        .unwrap();

    // Entry payloads.
    assert_eq!(read(out.join("sce_sys/param.sfo")), b"SFOTESTDATA\n");
    assert_eq!(read(out.join("sce_sys/icon0.png")), b"PNG\0");
    assert_eq!(read(out.join("sce_sys/39321")), b"XX");
    assert_eq!(read(out.join("sce_sys/nptitle.dat")), NP_PLAINTEXT);
    assert_eq!(read(out.join("sce_sys/entry_keys")).len(), 2048);
    assert_eq!(read(out.join("sce_sys/image_key")).len(), 256);

    // PFS files: sizes honour the inode, padding is truncated.
    let file_a = read(out.join("fileA.bin"));
    assert_eq!(file_a.len() as u64, FILE_A_SIZE);
    assert!(file_a.iter().all(|&b| b == 0xAA));

    let file_c = read(out.join("subdir/fileC.bin"));
    assert_eq!(file_c.len() as u64, FILE_C_SIZE);
    assert_eq!(file_c, &file_c_pattern()[..FILE_C_SIZE as usize]);
}

#[test]
fn single_and_multi_worker_outputs_match() {
    let tmp = tempfile::tempdir().unwrap();
    let pkg_path = build_pkg(tmp.path(), b"fileA.bin");
    let pkg = cnt_extract::open_pkg(&pkg_path).unwrap();

    let out_one = tmp.path().join("one").join("CUSA00001");
    let out_many = tmp.path().join("many").join("CUSA00001");

    PkgExtractor::new(&pkg, &pkg_path, SilentProgress, false)
        .with_threads(Some(1))
        .extract(&out_one)
        .unwrap();
    PkgExtractor::new(&pkg, &pkg_path, SilentProgress, false)
        .with_threads(Some(8))
        .extract(&out_many)
        .unwrap();

    let one = snapshot(&out_one);
    let many = snapshot(&out_many);
    assert_eq!(one, many);
    assert!(!one.is_empty());
}

#[test]
fn key_chain_is_bitwise_stable_across_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let pkg_path = build_pkg(tmp.path(), b"fileA.bin");

    let first = cnt_extract::open_pkg(&pkg_path).unwrap();
    let second = cnt_extract::open_pkg(&pkg_path).unwrap();

    assert_eq!(first.session().dk3(), second.session().dk3());
    assert_eq!(first.session().iv_key(), second.session().iv_key());
    assert_eq!(
        first.session().image_key().map(|k| k.as_slice()),
        second.session().image_key().map(|k| k.as_slice())
    );
    assert_eq!(
        first.session().ekpfs().unwrap(),
        second.session().ekpfs().unwrap()
    );
}

#[test]
fn malicious_dirent_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let pkg_path = build_pkg(tmp.path(), b"../evil");
    let out = tmp.path().join("nested").join("CUSA00001");

    let pkg = cnt_extract::open_pkg(&pkg_path).unwrap();

    let err = PkgExtractor::new(&pkg, &pkg_path, SilentProgress, false)
        .extract(&out)
        .unwrap_err();

    assert!(matches!(
        err,
        cnt_extract::ExtractError::WalkFailed {
            source: cnt_pfs::vfs::WalkError::PathEscape { .. }
        }
    ));

    // Nothing named "evil" escaped the output root.
    assert!(!tmp.path().join("nested").join("evil").exists());
    assert!(!tmp.path().join("evil").exists());
}
