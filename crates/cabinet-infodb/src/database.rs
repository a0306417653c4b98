//! Info database loader.
//!
//! The whole file is mapped (or owned) once; tables are exposed as typed
//! views over the packed records without copying them.

use std::ops::{Deref, Range};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use zerocopy::FromBytes;

use cabinet_common::{salt, BinaryReader};

use crate::error::StaleReason;
use crate::strings::{resolve, Text};
use crate::structs::*;
use crate::{Error, Result, StringRef, NOT_FOUND};

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Owned(data) => data,
        }
    }
}

const MACHINES: usize = 0;
const BIOSSETS: usize = 1;
const ROMS: usize = 2;
const DISKS: usize = 3;
const DEVICES: usize = 4;
const SLOTS: usize = 5;
const SLOT_OPTIONS: usize = 6;
const FEATURES: usize = 7;
const CHIPS: usize = 8;
const DISPLAYS: usize = 9;
const SAMPLES: usize = 10;
const CONFIGURATIONS: usize = 11;
const CONFIGURATION_SETTINGS: usize = 12;
const CONFIGURATION_CONDITIONS: usize = 13;
const SOFTWARE_LISTS: usize = 14;
const RAM_OPTIONS: usize = 15;

/// A loaded info database.
///
/// # Example
///
/// ```no_run
/// use cabinet_infodb::InfoDatabase;
///
/// let db = InfoDatabase::open("machines.infodb", None)?;
/// if let Some(pacman) = db.find_machine("pacman") {
///     println!("{} ({})", pacman.description(), pacman.year());
///     for rom in pacman.roms().iter() {
///         println!("  {} {} bytes", rom.name(), rom.size());
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct InfoDatabase {
    data: Backing,
    header: Header,
    tables: [Range<usize>; 16],
    strings: Range<usize>,
}

impl std::fmt::Debug for InfoDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfoDatabase")
            .field("counts", &self.header.counts)
            .field("len", &self.data.len())
            .finish()
    }
}

impl InfoDatabase {
    /// Memory-map and load a database file.
    ///
    /// When `expected_version` is given, a database built from a different
    /// emulator version is reported as [`Error::Stale`].
    pub fn open<P: AsRef<Path>>(path: P, expected_version: Option<&str>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        // SAFETY: the map is read-only and lives as long as the database.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::load(Backing::Mapped(mmap), expected_version)
    }

    /// Load a database from an owned buffer.
    pub fn from_bytes(data: Vec<u8>, expected_version: Option<&str>) -> Result<Self> {
        Self::load(Backing::Owned(data), expected_version)
    }

    fn load(data: Backing, expected_version: Option<&str>) -> Result<Self> {
        let mut reader = BinaryReader::new(&data);

        let salted: Header = reader
            .read_struct()
            .map_err(|_| Error::Corrupt("truncated header".into()))?;
        let header = salt::salt(&salted, &PEPPER);

        if { header.magic } != MAGIC_HDR {
            return Err(Error::Stale(StaleReason::BadMagic));
        }
        let expected_hash = layout_hash();
        if { header.sizes_hash } != expected_hash {
            return Err(Error::Stale(StaleReason::SizesHash {
                expected: expected_hash,
                actual: header.sizes_hash,
            }));
        }

        let c = header.counts;
        let tables = [
            carve::<Machine>(&mut reader, c.machines)?,
            carve::<Biosset>(&mut reader, c.biossets)?,
            carve::<Rom>(&mut reader, c.roms)?,
            carve::<Disk>(&mut reader, c.disks)?,
            carve::<Device>(&mut reader, c.devices)?,
            carve::<Slot>(&mut reader, c.slots)?,
            carve::<SlotOption>(&mut reader, c.slot_options)?,
            carve::<Feature>(&mut reader, c.features)?,
            carve::<Chip>(&mut reader, c.chips)?,
            carve::<Display>(&mut reader, c.displays)?,
            carve::<Sample>(&mut reader, c.samples)?,
            carve::<Configuration>(&mut reader, c.configurations)?,
            carve::<ConfigurationSetting>(&mut reader, c.configuration_settings)?,
            carve::<ConfigurationCondition>(&mut reader, c.configuration_conditions)?,
            carve::<SoftwareList>(&mut reader, c.software_lists)?,
            carve::<RamOption>(&mut reader, c.ram_options)?,
        ];

        let strings = reader.position()..data.len();
        if reader.remaining() < 8 {
            return Err(Error::Corrupt("truncated string table".into()));
        }
        if reader.read_u32()? != MAGIC_STRINGTABLE_BEGIN {
            return Err(Error::Corrupt("bad string table start sentinel".into()));
        }
        if LittleEndian::read_u32(&data[data.len() - 4..]) != MAGIC_STRINGTABLE_END {
            return Err(Error::Corrupt("bad string table end sentinel".into()));
        }

        let db = Self { data, header, tables, strings };

        let build = db
            .try_string(header.build)
            .map_err(|e| Error::Corrupt(format!("build string: {e}")))?;
        if let Some(expected) = expected_version {
            if build.as_str() != expected {
                return Err(Error::Stale(StaleReason::Version {
                    expected: expected.to_owned(),
                    actual: build.to_owned_string(),
                }));
            }
        }

        db.validate()?;
        tracing::debug!(machines = { c.machines }, version = %db.version(), "info database loaded");
        Ok(db)
    }

    /// Check that every child span and machine reference stays in bounds.
    fn validate(&self) -> Result<()> {
        fn check(span: Span, len: usize, what: &str) -> Result<()> {
            if span.end() > len as u64 {
                return Err(Error::Corrupt(format!("{what} span out of bounds")));
            }
            Ok(())
        }

        let c = self.header.counts;
        for m in self.records::<Machine>(MACHINES) {
            check(m.biossets, c.biossets as usize, Biosset::TABLE)?;
            check(m.roms, c.roms as usize, Rom::TABLE)?;
            check(m.disks, c.disks as usize, Disk::TABLE)?;
            check(m.devices, c.devices as usize, Device::TABLE)?;
            check(m.slots, c.slots as usize, Slot::TABLE)?;
            check(m.features, c.features as usize, Feature::TABLE)?;
            check(m.chips, c.chips as usize, Chip::TABLE)?;
            check(m.displays, c.displays as usize, Display::TABLE)?;
            check(m.samples, c.samples as usize, Sample::TABLE)?;
            check(m.configurations, c.configurations as usize, Configuration::TABLE)?;
            check(m.software_lists, c.software_lists as usize, SoftwareList::TABLE)?;
            check(m.ram_options, c.ram_options as usize, RamOption::TABLE)?;
            for reference in [m.clone_of, m.rom_of] {
                if reference != NOT_FOUND && reference >= c.machines {
                    return Err(Error::Corrupt("machine reference out of bounds".into()));
                }
            }
        }
        for s in self.records::<Slot>(SLOTS) {
            check(s.slot_options, c.slot_options as usize, SlotOption::TABLE)?;
        }
        for cfg in self.records::<Configuration>(CONFIGURATIONS) {
            check(cfg.settings, c.configuration_settings as usize, ConfigurationSetting::TABLE)?;
        }
        for setting in self.records::<ConfigurationSetting>(CONFIGURATION_SETTINGS) {
            check(
                setting.conditions,
                c.configuration_conditions as usize,
                ConfigurationCondition::TABLE,
            )?;
        }
        Ok(())
    }

    fn records<T: Record>(&self, table: usize) -> &[T] {
        // Ranges were carved to exact multiples of the record size.
        <[T]>::ref_from_bytes(&self.data[self.tables[table].clone()]).unwrap_or(&[])
    }

    fn table<T: Record>(&self, table: usize) -> Table<'_, T> {
        Table { db: self, records: self.records(table), base: 0 }
    }

    /// Resolve a string reference, reporting references outside the table.
    pub fn try_string(&self, reference: StringRef) -> Result<Text<'_>> {
        resolve(&self.data[self.strings.clone()], reference)
    }

    /// Resolve a string reference, falling back to the empty string.
    pub fn string(&self, reference: StringRef) -> Text<'_> {
        self.try_string(reference).unwrap_or(Text::Table(""))
    }

    /// Emulator build string the database was created from.
    pub fn version(&self) -> Text<'_> {
        self.string(self.header.build)
    }

    /// Record counts.
    pub fn counts(&self) -> TableCounts {
        self.header.counts
    }

    /// Size of the loaded file in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Find a machine by exact name.
    pub fn find_machine(&self, name: &str) -> Option<Entry<'_, Machine>> {
        let machines = self.machines();
        let index = machines
            .records
            .binary_search_by(|m| self.string(m.name).as_bytes().cmp(name.as_bytes()))
            .ok()?;
        machines.get(index)
    }

    pub fn machines(&self) -> Table<'_, Machine> {
        self.table(MACHINES)
    }

    pub fn biossets(&self) -> Table<'_, Biosset> {
        self.table(BIOSSETS)
    }

    pub fn roms(&self) -> Table<'_, Rom> {
        self.table(ROMS)
    }

    pub fn disks(&self) -> Table<'_, Disk> {
        self.table(DISKS)
    }

    pub fn devices(&self) -> Table<'_, Device> {
        self.table(DEVICES)
    }

    pub fn slots(&self) -> Table<'_, Slot> {
        self.table(SLOTS)
    }

    pub fn slot_options(&self) -> Table<'_, SlotOption> {
        self.table(SLOT_OPTIONS)
    }

    pub fn features(&self) -> Table<'_, Feature> {
        self.table(FEATURES)
    }

    pub fn chips(&self) -> Table<'_, Chip> {
        self.table(CHIPS)
    }

    pub fn displays(&self) -> Table<'_, Display> {
        self.table(DISPLAYS)
    }

    pub fn samples(&self) -> Table<'_, Sample> {
        self.table(SAMPLES)
    }

    pub fn configurations(&self) -> Table<'_, Configuration> {
        self.table(CONFIGURATIONS)
    }

    pub fn configuration_settings(&self) -> Table<'_, ConfigurationSetting> {
        self.table(CONFIGURATION_SETTINGS)
    }

    pub fn configuration_conditions(&self) -> Table<'_, ConfigurationCondition> {
        self.table(CONFIGURATION_CONDITIONS)
    }

    pub fn software_lists(&self) -> Table<'_, SoftwareList> {
        self.table(SOFTWARE_LISTS)
    }

    pub fn ram_options(&self) -> Table<'_, RamOption> {
        self.table(RAM_OPTIONS)
    }
}

fn carve<T: Record>(reader: &mut BinaryReader<'_>, count: u32) -> Result<Range<usize>> {
    let start = reader.position();
    reader
        .read_table::<T>(count)
        .map_err(|_| Error::Corrupt(format!("truncated {} table", T::TABLE)))?;
    Ok(start..reader.position())
}

/// A typed view over a run of records.
pub struct Table<'a, T> {
    db: &'a InfoDatabase,
    records: &'a [T],
    base: u32,
}

impl<T> Clone for Table<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Table<'_, T> {}

impl<'a, T: Record> Table<'a, T> {
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get the record at `index` within this view.
    pub fn get(&self, index: usize) -> Option<Entry<'a, T>> {
        let record = self.records.get(index)?;
        Some(Entry { db: self.db, index: self.base + index as u32, record })
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Entry<'a, T>> + 'a {
        let (db, base) = (self.db, self.base);
        self.records
            .iter()
            .enumerate()
            .map(move |(i, record)| Entry { db, index: base + i as u32, record })
    }

    /// Narrow a whole-table view to a child span.
    pub(crate) fn span(&self, span: Span) -> Self {
        Self {
            db: self.db,
            records: self.records.get(span.range()).unwrap_or(&[]),
            base: span.index,
        }
    }
}

impl<'a, T: Record> IntoIterator for Table<'a, T> {
    type Item = Entry<'a, T>;
    type IntoIter = Box<dyn ExactSizeIterator<Item = Entry<'a, T>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// A record together with its table index and the database it came from.
pub struct Entry<'a, T> {
    pub(crate) db: &'a InfoDatabase,
    index: u32,
    record: &'a T,
}

impl<T> Clone for Entry<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Entry<'_, T> {}

impl<'a, T> Entry<'a, T> {
    /// Index of the record in its table.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The raw record.
    #[inline]
    pub fn record(&self) -> &'a T {
        self.record
    }

    #[inline]
    pub(crate) fn text(&self, reference: StringRef) -> Text<'a> {
        self.db.string(reference)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Entry<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("index", &self.index)
            .field("record", self.record)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InfoDbBuilder;

    const XML: &str = r#"<mame build="0.261 (mame0261)">
        <machine name="puckman" sourcefile="pacman/pacman.cpp">
            <description>PuckMan (Japan set 1)</description>
            <year>1980</year>
            <manufacturer>Namco</manufacturer>
            <rom name="pm1_prg1.6e" size="2048" crc="f36e88ab" sha1="813cecf44bf5464b1aed64b36f5047e4c79ba176" region="maincpu" offset="0"/>
        </machine>
        <machine name="pacman" cloneof="puckman" romof="puckman">
            <description>Pac-Man (Midway)</description>
            <rom name="pacman.6e" merge="pm1_prg1.6e" size="4096" crc="c1e6ab10" region="maincpu" offset="1000"/>
        </machine>
        <machine name="mspacman" cloneof="pacman" romof="nonexistent"/>
    </mame>"#;

    fn built() -> Vec<u8> {
        let mut builder = InfoDbBuilder::new();
        builder.process_xml(XML.as_bytes(), None, None).unwrap();
        builder.to_bytes().unwrap()
    }

    #[test]
    fn test_find_machine() {
        let db = InfoDatabase::from_bytes(built(), None).unwrap();

        let names: Vec<_> = db.machines().iter().map(|m| m.name().to_owned_string()).collect();
        assert_eq!(names, ["mspacman", "pacman", "puckman"]);

        for (index, name) in names.iter().enumerate() {
            assert_eq!(db.find_machine(name).unwrap().index(), index as u32);
        }
        assert!(db.find_machine("galaga").is_none());
        assert!(db.find_machine("").is_none());
    }

    #[test]
    fn test_cross_references() {
        let db = InfoDatabase::from_bytes(built(), None).unwrap();

        let pacman = db.find_machine("pacman").unwrap();
        assert_eq!(pacman.clone_of().unwrap().name(), "puckman");
        assert_eq!(pacman.rom_of().unwrap().name(), "puckman");

        let ms = db.find_machine("mspacman").unwrap();
        assert_eq!(ms.clone_of().unwrap().name(), "pacman");
        assert!(ms.rom_of().is_none());
        assert_eq!({ ms.record().rom_of }, NOT_FOUND);

        let puckman = db.find_machine("puckman").unwrap();
        assert!(puckman.clone_of().is_none());
    }

    #[test]
    fn test_rom_fields() {
        let db = InfoDatabase::from_bytes(built(), None).unwrap();
        let pacman = db.find_machine("pacman").unwrap();
        let rom = pacman.roms().get(0).unwrap();
        assert_eq!(rom.name(), "pacman.6e");
        assert_eq!(rom.merge(), "pm1_prg1.6e");
        assert_eq!(rom.size(), 4096);
        assert_eq!(rom.offset(), 0x1000);
        assert_eq!(rom.crc(), Some([0xC1, 0xE6, 0xAB, 0x10]));
        assert_eq!(rom.sha1(), None);
        assert_eq!(rom.index(), 1);

        let puckman = db.find_machine("puckman").unwrap();
        assert_eq!(puckman.year(), "1980");
        assert_eq!(puckman.sourcefile(), "pacman/pacman.cpp");
    }

    #[test]
    fn test_version_check() {
        let data = built();
        assert!(InfoDatabase::from_bytes(data.clone(), Some("0.261 (mame0261)")).is_ok());

        let err = InfoDatabase::from_bytes(data, Some("0.262 (mame0262)")).unwrap_err();
        assert!(err.needs_rebuild());
        assert!(matches!(err, Error::Stale(StaleReason::Version { .. })));
        assert_eq!(
            err.to_string(),
            "info database is stale: built for version '0.261 (mame0261)', expected '0.262 (mame0262)'"
        );
    }

    #[test]
    fn test_flipped_magic_needs_rebuild() {
        let mut data = built();
        data[0] ^= 0x01;
        let err = InfoDatabase::from_bytes(data, None).unwrap_err();
        assert!(matches!(err, Error::Stale(StaleReason::BadMagic)));
        assert!(err.needs_rebuild());
    }

    #[test]
    fn test_tampered_sizes_hash_needs_rebuild() {
        let mut data = built();
        data[5] ^= 0x40;
        let err = InfoDatabase::from_bytes(data, None).unwrap_err();
        assert!(matches!(err, Error::Stale(StaleReason::SizesHash { .. })));
        assert!(err.needs_rebuild());
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let data = built();
        for len in [0, 10, data.len() / 2, data.len() - 1] {
            let err = InfoDatabase::from_bytes(data[..len].to_vec(), None).unwrap_err();
            assert!(err.needs_rebuild(), "len {len}: {err}");
        }
    }

    #[test]
    fn test_open_mapped_file() {
        let path = std::env::temp_dir().join(format!("cabinet-infodb-{}.bin", std::process::id()));
        std::fs::write(&path, built()).unwrap();
        let db = InfoDatabase::open(&path, None).unwrap();
        assert_eq!({ db.counts().machines }, 3);
        assert_eq!(db.roms().len(), 2);
        drop(db);
        std::fs::remove_file(&path).unwrap();
    }
}
