//! Typed accessors for database entries.

use crate::database::{Entry, Table};
use crate::strings::Text;
use crate::structs::*;
use crate::types::*;
use crate::NOT_FOUND;

fn checksum<const N: usize>(bytes: [u8; N]) -> Option<[u8; N]> {
    bytes.iter().any(|&b| b != 0).then_some(bytes)
}

fn unless_max<T: PartialEq>(value: T, max: T) -> Option<T> {
    (value != max).then_some(value)
}

impl<'a> Entry<'a, Machine> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn sourcefile(&self) -> Text<'a> {
        self.text(self.record().sourcefile)
    }

    pub fn description(&self) -> Text<'a> {
        self.text(self.record().description)
    }

    pub fn year(&self) -> Text<'a> {
        self.text(self.record().year)
    }

    pub fn manufacturer(&self) -> Text<'a> {
        self.text(self.record().manufacturer)
    }

    fn machine_at(&self, index: u32) -> Option<Entry<'a, Machine>> {
        if index == NOT_FOUND {
            return None;
        }
        self.db.machines().get(index as usize)
    }

    /// The parent machine this one is a clone of.
    pub fn clone_of(&self) -> Option<Entry<'a, Machine>> {
        self.machine_at(self.record().clone_of)
    }

    /// The machine this one takes ROMs from.
    pub fn rom_of(&self) -> Option<Entry<'a, Machine>> {
        self.machine_at(self.record().rom_of)
    }

    pub fn runnable(&self) -> bool {
        Tristate::from_u8(self.record().runnable).unwrap_or(true)
    }

    pub fn is_bios(&self) -> Tristate {
        Tristate::from_u8(self.record().is_bios)
    }

    pub fn is_device(&self) -> Tristate {
        Tristate::from_u8(self.record().is_device)
    }

    pub fn is_mechanical(&self) -> Tristate {
        Tristate::from_u8(self.record().is_mechanical)
    }

    pub fn quality_status(&self) -> DriverQuality {
        DriverQuality::from_u8(self.record().quality_status)
    }

    pub fn quality_emulation(&self) -> DriverQuality {
        DriverQuality::from_u8(self.record().quality_emulation)
    }

    pub fn quality_cocktail(&self) -> DriverQuality {
        DriverQuality::from_u8(self.record().quality_cocktail)
    }

    pub fn save_state_supported(&self) -> Tristate {
        Tristate::from_u8(self.record().save_state_supported)
    }

    pub fn unofficial(&self) -> Tristate {
        Tristate::from_u8(self.record().unofficial)
    }

    pub fn incomplete(&self) -> Tristate {
        Tristate::from_u8(self.record().incomplete)
    }

    /// Number of sound channels, if the machine declares any sound.
    pub fn sound_channels(&self) -> Option<u8> {
        unless_max(self.record().sound_channels, u8::MAX)
    }

    pub fn biossets(&self) -> Table<'a, Biosset> {
        self.db.biossets().span(self.record().biossets)
    }

    pub fn roms(&self) -> Table<'a, Rom> {
        self.db.roms().span(self.record().roms)
    }

    pub fn disks(&self) -> Table<'a, Disk> {
        self.db.disks().span(self.record().disks)
    }

    pub fn devices(&self) -> Table<'a, Device> {
        self.db.devices().span(self.record().devices)
    }

    pub fn slots(&self) -> Table<'a, Slot> {
        self.db.slots().span(self.record().slots)
    }

    pub fn features(&self) -> Table<'a, Feature> {
        self.db.features().span(self.record().features)
    }

    pub fn chips(&self) -> Table<'a, Chip> {
        self.db.chips().span(self.record().chips)
    }

    pub fn displays(&self) -> Table<'a, Display> {
        self.db.displays().span(self.record().displays)
    }

    pub fn samples(&self) -> Table<'a, Sample> {
        self.db.samples().span(self.record().samples)
    }

    pub fn configurations(&self) -> Table<'a, Configuration> {
        self.db.configurations().span(self.record().configurations)
    }

    pub fn software_lists(&self) -> Table<'a, SoftwareList> {
        self.db.software_lists().span(self.record().software_lists)
    }

    pub fn ram_options(&self) -> Table<'a, RamOption> {
        self.db.ram_options().span(self.record().ram_options)
    }
}

impl<'a> Entry<'a, Biosset> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn description(&self) -> Text<'a> {
        self.text(self.record().description)
    }

    pub fn is_default(&self) -> bool {
        Tristate::from_u8(self.record().default).unwrap_or(false)
    }
}

impl<'a> Entry<'a, Rom> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn bios(&self) -> Text<'a> {
        self.text(self.record().bios)
    }

    pub fn size(&self) -> u32 {
        self.record().size
    }

    pub fn merge(&self) -> Text<'a> {
        self.text(self.record().merge)
    }

    pub fn region(&self) -> Text<'a> {
        self.text(self.record().region)
    }

    pub fn offset(&self) -> u64 {
        self.record().offset
    }

    /// CRC32, or `None` when the document gave none.
    pub fn crc(&self) -> Option<[u8; 4]> {
        checksum(self.record().crc)
    }

    /// SHA-1, or `None` when the document gave none.
    pub fn sha1(&self) -> Option<[u8; 20]> {
        checksum(self.record().sha1)
    }

    pub fn status(&self) -> DumpStatus {
        DumpStatus::from_u8(self.record().status)
    }

    pub fn optional(&self) -> bool {
        Tristate::from_u8(self.record().optional).unwrap_or(false)
    }
}

impl<'a> Entry<'a, Disk> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn merge(&self) -> Text<'a> {
        self.text(self.record().merge)
    }

    pub fn region(&self) -> Text<'a> {
        self.text(self.record().region)
    }

    pub fn disk_index(&self) -> u32 {
        self.record().index
    }

    pub fn sha1(&self) -> Option<[u8; 20]> {
        checksum(self.record().sha1)
    }

    pub fn writable(&self) -> bool {
        Tristate::from_u8(self.record().writable).unwrap_or(false)
    }

    pub fn status(&self) -> DumpStatus {
        DumpStatus::from_u8(self.record().status)
    }

    pub fn optional(&self) -> bool {
        Tristate::from_u8(self.record().optional).unwrap_or(false)
    }
}

impl<'a> Entry<'a, Device> {
    pub fn device_type(&self) -> Text<'a> {
        self.text(self.record().type_)
    }

    pub fn tag(&self) -> Text<'a> {
        self.text(self.record().tag)
    }

    pub fn interface(&self) -> Text<'a> {
        self.text(self.record().interface)
    }

    pub fn instance_name(&self) -> Text<'a> {
        self.text(self.record().instance_name)
    }

    /// File extensions accepted by the device, without the separators.
    pub fn extensions(&self) -> Vec<String> {
        self.text(self.record().extensions)
            .split(',')
            .filter(|ext| !ext.is_empty())
            .map(str::to_owned)
            .collect()
    }

    pub fn mandatory(&self) -> bool {
        Tristate::from_u8(self.record().mandatory).unwrap_or(false)
    }
}

impl<'a> Entry<'a, Slot> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn options(&self) -> Table<'a, SlotOption> {
        self.db.slot_options().span(self.record().slot_options)
    }

    /// The option selected when none is given on the command line.
    pub fn default_option(&self) -> Option<Entry<'a, SlotOption>> {
        self.options().iter().find(|option| option.is_default())
    }
}

impl<'a> Entry<'a, SlotOption> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn devname(&self) -> Text<'a> {
        self.text(self.record().devname)
    }

    pub fn is_default(&self) -> bool {
        Tristate::from_u8(self.record().is_default).unwrap_or(false)
    }
}

impl Entry<'_, Feature> {
    pub fn feature_type(&self) -> FeatureType {
        FeatureType::from_u8(self.record().type_)
    }

    pub fn status(&self) -> FeatureQuality {
        FeatureQuality::from_u8(self.record().status)
    }

    pub fn overall(&self) -> FeatureQuality {
        FeatureQuality::from_u8(self.record().overall)
    }
}

impl<'a> Entry<'a, Chip> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn tag(&self) -> Text<'a> {
        self.text(self.record().tag)
    }

    pub fn clock(&self) -> u64 {
        self.record().clock
    }

    pub fn chip_type(&self) -> ChipType {
        ChipType::from_u8(self.record().type_)
    }
}

impl<'a> Entry<'a, Display> {
    pub fn tag(&self) -> Text<'a> {
        self.text(self.record().tag)
    }

    pub fn width(&self) -> Option<u32> {
        unless_max(self.record().width, u32::MAX)
    }

    pub fn height(&self) -> Option<u32> {
        unless_max(self.record().height, u32::MAX)
    }

    pub fn refresh(&self) -> Option<f32> {
        let refresh = self.record().refresh;
        (!refresh.is_nan()).then_some(refresh)
    }

    pub fn pixclock(&self) -> Option<u64> {
        unless_max(self.record().pixclock, u64::MAX)
    }

    pub fn htotal(&self) -> Option<u32> {
        unless_max(self.record().htotal, u32::MAX)
    }

    pub fn hbend(&self) -> Option<u32> {
        unless_max(self.record().hbend, u32::MAX)
    }

    pub fn hbstart(&self) -> Option<u32> {
        unless_max(self.record().hbstart, u32::MAX)
    }

    pub fn vtotal(&self) -> Option<u32> {
        unless_max(self.record().vtotal, u32::MAX)
    }

    pub fn vbend(&self) -> Option<u32> {
        unless_max(self.record().vbend, u32::MAX)
    }

    pub fn vbstart(&self) -> Option<u32> {
        unless_max(self.record().vbstart, u32::MAX)
    }

    pub fn display_type(&self) -> DisplayType {
        DisplayType::from_u8(self.record().type_)
    }

    pub fn rotation(&self) -> Rotation {
        Rotation::from_u8(self.record().rotate)
    }

    pub fn flipx(&self) -> Tristate {
        Tristate::from_u8(self.record().flipx)
    }
}

impl<'a> Entry<'a, Sample> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }
}

impl<'a> Entry<'a, Configuration> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn tag(&self) -> Text<'a> {
        self.text(self.record().tag)
    }

    pub fn mask(&self) -> u32 {
        self.record().mask
    }

    pub fn settings(&self) -> Table<'a, ConfigurationSetting> {
        self.db.configuration_settings().span(self.record().settings)
    }

    /// The setting matching a port value, if any.
    pub fn setting_for(&self, port_value: u32) -> Option<Entry<'a, ConfigurationSetting>> {
        let masked = port_value & self.mask();
        self.settings().iter().find(|setting| setting.value() == masked)
    }
}

impl<'a> Entry<'a, ConfigurationSetting> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn value(&self) -> u32 {
        self.record().value
    }

    pub fn conditions(&self) -> Table<'a, ConfigurationCondition> {
        self.db.configuration_conditions().span(self.record().conditions)
    }
}

impl<'a> Entry<'a, ConfigurationCondition> {
    pub fn tag(&self) -> Text<'a> {
        self.text(self.record().tag)
    }

    pub fn mask(&self) -> u32 {
        self.record().mask
    }

    pub fn value(&self) -> u32 {
        self.record().value
    }

    pub fn relation(&self) -> Relation {
        Relation::from_u8(self.record().relation)
    }

    /// Evaluate against the current value of the condition's port.
    pub fn holds(&self, port_value: u32) -> bool {
        self.relation().holds(port_value & self.mask(), self.value())
    }
}

impl<'a> Entry<'a, SoftwareList> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn filter(&self) -> Text<'a> {
        self.text(self.record().filter)
    }

    pub fn status(&self) -> SoftwareListStatus {
        SoftwareListStatus::from_u8(self.record().status)
    }
}

impl<'a> Entry<'a, RamOption> {
    pub fn name(&self) -> Text<'a> {
        self.text(self.record().name)
    }

    pub fn value(&self) -> u32 {
        self.record().value
    }

    pub fn is_default(&self) -> bool {
        Tristate::from_u8(self.record().is_default).unwrap_or(false)
    }
}
