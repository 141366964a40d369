use snafu::Snafu;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::big_endian::{U32, U64},
};

use std::path::{Path, PathBuf};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum EntryError {
    #[snafu(display("source buffer is too short"))]
    SourceTooShort,
}

type Result<T, E = EntryError> = std::result::Result<T, E>;

/// Raw on-disk entry record (32 bytes, big-endian).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub(crate) struct PkgEntryRaw {
    id: U32,
    filename_offset: U32,
    flags1: U32,
    flags2: U32,
    data_offset: U32,
    data_size: U32,
    reserved: U64,
}

/// One record of the PKG entry table.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct PkgEntry {
    raw: PkgEntryRaw,
}

impl PkgEntry {
    pub const RAW_SIZE: usize = size_of::<PkgEntryRaw>();

    /// Reads an entry from its 32 on-disk bytes.
    pub fn read(raw: &[u8]) -> Result<Self> {
        let (raw, _) = PkgEntryRaw::read_from_prefix(raw).map_err(|_| SourceTooShortSnafu.build())?;

        Ok(Self { raw })
    }

    #[must_use]
    pub const fn id(&self) -> u32 {
        self.raw.id.get()
    }

    #[must_use]
    pub const fn entry_id(&self) -> EntryId {
        EntryId::from_u32(self.id())
    }

    #[must_use]
    pub const fn filename_offset(&self) -> u32 {
        self.raw.filename_offset.get()
    }

    /// Absolute offset of the payload within the PKG.
    #[must_use]
    pub const fn data_offset(&self) -> u64 {
        self.raw.data_offset.get() as _
    }

    /// Payload size in bytes.
    #[must_use]
    pub const fn data_size(&self) -> u64 {
        self.raw.data_size.get() as _
    }

    /// The entry's on-disk bytes, as hashed by the IV derivation.
    #[must_use]
    pub fn record_bytes(&self) -> &[u8; 32] {
        self.raw.as_bytes().try_into().expect("entry record is 32 bytes")
    }

    /// Output path for this entry under `base` (the `sce_sys` directory).
    #[must_use]
    pub fn to_path<B: AsRef<Path>>(&self, base: B) -> PathBuf {
        self.entry_id().to_path(base)
    }
}

/// Known PKG entry identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EntryId {
    // Metadata entries (0x0001 - 0x0200)
    Digests,
    EntryKeys,
    PfsImageKey,
    GeneralDigests,
    Metas,
    EntryNames,

    // License and system entries (0x0400 - 0x0409)
    LicenseDat,
    LicenseInfo,
    NptitleDat,
    NpbindDat,
    SelfinfoDat,
    ImageinfoDat,
    TargetDeltainfoDat,
    OriginDeltainfoDat,
    PsreservedDat,

    // Content entries (0x1000 - 0x100E)
    ParamSfo,
    PlaygoChunkDat,
    PlaygoChunkSha,
    PlaygoManifestXml,
    PronunciationXml,
    PronunciationSig,
    Pic1Png,
    PubtoolinfoDat,
    AppPlaygoChunkDat,
    AppPlaygoChunkSha,
    AppPlaygoManifestXml,
    ShareparamJson,
    ShareoverlayimagePng,
    SaveDataPng,
    ShareprivacyguardimagePng,

    // Icon entries (0x1200 - 0x121F)
    Icon0Png,
    /// `icon0_00.png` .. `icon0_30.png`
    Icon0PngIndexed(u8),

    // Picture entries (0x1220 - 0x125F)
    Pic0Png,
    Snd0At9,
    /// `pic1_00.png` .. `pic1_30.png`
    Pic1PngIndexed(u8),

    // Changeinfo entries (0x1260 - 0x127F)
    ChangeinfoXml,
    /// `changeinfo_00.xml` .. `changeinfo_30.xml`
    ChangeinfoXmlIndexed(u8),

    // DDS entries (0x1280 - 0x12DF)
    Icon0Dds,
    /// `icon0_00.dds` .. `icon0_30.dds`
    Icon0DdsIndexed(u8),
    Pic0Dds,
    Pic1Dds,
    /// `pic1_00.dds` .. `pic1_30.dds`
    Pic1DdsIndexed(u8),

    // Trophy entries (0x1400 - 0x1463)
    /// `trophy00.trp` .. `trophy99.trp`
    Trophy(u8),

    /// Unrecognized entry ID; exported under its decimal rendering.
    Unknown(u32),
}

impl EntryId {
    /// Converts a raw numeric entry ID into an [`EntryId`].
    #[must_use]
    pub const fn from_u32(raw: u32) -> Self {
        match raw {
            0x0000_0001 => Self::Digests,
            0x0000_0010 => Self::EntryKeys,
            0x0000_0020 => Self::PfsImageKey,
            0x0000_0080 => Self::GeneralDigests,
            0x0000_0100 => Self::Metas,
            0x0000_0200 => Self::EntryNames,

            0x0000_0400 => Self::LicenseDat,
            0x0000_0401 => Self::LicenseInfo,
            0x0000_0402 => Self::NptitleDat,
            0x0000_0403 => Self::NpbindDat,
            0x0000_0404 => Self::SelfinfoDat,
            0x0000_0406 => Self::ImageinfoDat,
            0x0000_0407 => Self::TargetDeltainfoDat,
            0x0000_0408 => Self::OriginDeltainfoDat,
            0x0000_0409 => Self::PsreservedDat,

            0x0000_1000 => Self::ParamSfo,
            0x0000_1001 => Self::PlaygoChunkDat,
            0x0000_1002 => Self::PlaygoChunkSha,
            0x0000_1003 => Self::PlaygoManifestXml,
            0x0000_1004 => Self::PronunciationXml,
            0x0000_1005 => Self::PronunciationSig,
            0x0000_1006 => Self::Pic1Png,
            0x0000_1007 => Self::PubtoolinfoDat,
            0x0000_1008 => Self::AppPlaygoChunkDat,
            0x0000_1009 => Self::AppPlaygoChunkSha,
            0x0000_100a => Self::AppPlaygoManifestXml,
            0x0000_100b => Self::ShareparamJson,
            0x0000_100c => Self::ShareoverlayimagePng,
            0x0000_100d => Self::SaveDataPng,
            0x0000_100e => Self::ShareprivacyguardimagePng,

            0x0000_1200 => Self::Icon0Png,
            0x0000_1201..=0x0000_121F => Self::Icon0PngIndexed((raw - 0x0000_1201) as u8),

            0x0000_1220 => Self::Pic0Png,
            0x0000_1240 => Self::Snd0At9,
            0x0000_1241..=0x0000_125F => Self::Pic1PngIndexed((raw - 0x0000_1241) as u8),

            0x0000_1260 => Self::ChangeinfoXml,
            0x0000_1261..=0x0000_127F => Self::ChangeinfoXmlIndexed((raw - 0x0000_1261) as u8),

            0x0000_1280 => Self::Icon0Dds,
            0x0000_1281..=0x0000_129F => Self::Icon0DdsIndexed((raw - 0x0000_1281) as u8),
            0x0000_12a0 => Self::Pic0Dds,
            0x0000_12c0 => Self::Pic1Dds,
            0x0000_12c1..=0x0000_12df => Self::Pic1DdsIndexed((raw - 0x0000_12c1) as u8),

            0x0000_1400..=0x0000_1463 => Self::Trophy((raw - 0x0000_1400) as u8),

            other => Self::Unknown(other),
        }
    }

    /// Output path for this entry ID under `base`.
    ///
    /// Unknown IDs are rendered as their decimal value, so every entry has
    /// a destination.
    #[must_use]
    pub fn to_path<B: AsRef<Path>>(self, base: B) -> PathBuf {
        let base = base.as_ref();
        match self {
            Self::Digests => base.join("digests"),
            Self::EntryKeys => base.join("entry_keys"),
            Self::PfsImageKey => base.join("image_key"),
            Self::GeneralDigests => base.join("general_digests"),
            Self::Metas => base.join("metas"),
            Self::EntryNames => base.join("entry_names"),

            Self::LicenseDat => base.join("license.dat"),
            Self::LicenseInfo => base.join("license.info"),
            Self::NptitleDat => base.join("nptitle.dat"),
            Self::NpbindDat => base.join("npbind.dat"),
            Self::SelfinfoDat => base.join("selfinfo.dat"),
            Self::ImageinfoDat => base.join("imageinfo.dat"),
            Self::TargetDeltainfoDat => base.join("target-deltainfo.dat"),
            Self::OriginDeltainfoDat => base.join("origin-deltainfo.dat"),
            Self::PsreservedDat => base.join("psreserved.dat"),

            Self::ParamSfo => base.join("param.sfo"),
            Self::PlaygoChunkDat => base.join("playgo-chunk.dat"),
            Self::PlaygoChunkSha => base.join("playgo-chunk.sha"),
            Self::PlaygoManifestXml => base.join("playgo-manifest.xml"),
            Self::PronunciationXml => base.join("pronunciation.xml"),
            Self::PronunciationSig => base.join("pronunciation.sig"),
            Self::Pic1Png => base.join("pic1.png"),
            Self::PubtoolinfoDat => base.join("pubtoolinfo.dat"),
            Self::AppPlaygoChunkDat => base.join("app").join("playgo-chunk.dat"),
            Self::AppPlaygoChunkSha => base.join("app").join("playgo-chunk.sha"),
            Self::AppPlaygoManifestXml => base.join("app").join("playgo-manifest.xml"),
            Self::ShareparamJson => base.join("shareparam.json"),
            Self::ShareoverlayimagePng => base.join("shareoverlayimage.png"),
            Self::SaveDataPng => base.join("save_data.png"),
            Self::ShareprivacyguardimagePng => base.join("shareprivacyguardimage.png"),

            Self::Icon0Png => base.join("icon0.png"),
            Self::Icon0PngIndexed(idx) => base.join(format!("icon0_{:02}.png", idx)),

            Self::Pic0Png => base.join("pic0.png"),
            Self::Snd0At9 => base.join("snd0.at9"),
            Self::Pic1PngIndexed(idx) => base.join(format!("pic1_{:02}.png", idx)),

            Self::ChangeinfoXml => base.join("changeinfo").join("changeinfo.xml"),
            Self::ChangeinfoXmlIndexed(idx) => base
                .join("changeinfo")
                .join(format!("changeinfo_{:02}.xml", idx)),

            Self::Icon0Dds => base.join("icon0.dds"),
            Self::Icon0DdsIndexed(idx) => base.join(format!("icon0_{:02}.dds", idx)),
            Self::Pic0Dds => base.join("pic0.dds"),
            Self::Pic1Dds => base.join("pic1.dds"),
            Self::Pic1DdsIndexed(idx) => base.join(format!("pic1_{:02}.dds", idx)),

            Self::Trophy(idx) => base.join("trophy").join(format!("trophy{:02}.trp", idx)),

            Self::Unknown(raw) => base.join(raw.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_entry_is_32_bytes() {
        assert_eq!(PkgEntry::RAW_SIZE, 32);
    }

    #[test]
    fn fields_are_big_endian() {
        let mut raw = [0u8; 32];
        raw[..4].copy_from_slice(&0x1000u32.to_be_bytes()); // id: param.sfo
        raw[16..20].copy_from_slice(&0x0000_0400u32.to_be_bytes()); // data offset
        raw[20..24].copy_from_slice(&12u32.to_be_bytes()); // data size

        let entry = PkgEntry::read(&raw).unwrap();
        assert_eq!(entry.id(), 0x1000);
        assert_eq!(entry.entry_id(), EntryId::ParamSfo);
        assert_eq!(entry.data_offset(), 0x400);
        assert_eq!(entry.data_size(), 12);
        assert_eq!(entry.record_bytes(), &raw);
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(matches!(
            PkgEntry::read(&[0u8; 16]),
            Err(EntryError::SourceTooShort)
        ));
    }

    #[test]
    fn known_ids_map_to_names() {
        let base = Path::new("sce_sys");

        assert_eq!(
            EntryId::from_u32(0x1000).to_path(base),
            base.join("param.sfo")
        );
        assert_eq!(
            EntryId::from_u32(0x1200).to_path(base),
            base.join("icon0.png")
        );
        assert_eq!(
            EntryId::from_u32(0x0402).to_path(base),
            base.join("nptitle.dat")
        );
        assert_eq!(
            EntryId::from_u32(0x1203).to_path(base),
            base.join("icon0_02.png")
        );
        assert_eq!(
            EntryId::from_u32(0x1401).to_path(base),
            base.join("trophy").join("trophy01.trp")
        );
    }

    #[test]
    fn unknown_ids_render_as_decimal() {
        let base = Path::new("sce_sys");

        assert_eq!(EntryId::from_u32(0x9999), EntryId::Unknown(0x9999));
        assert_eq!(EntryId::from_u32(0x9999).to_path(base), base.join("39321"));
    }
}
