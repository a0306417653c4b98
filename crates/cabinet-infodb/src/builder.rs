//! Info database builder.
//!
//! Consumes the emulator's `-listxml` document as a stream and produces the
//! binary database: a salted [`Header`], sixteen packed record tables and
//! the string table.
//!
//! # Example
//!
//! ```no_run
//! use cabinet_infodb::InfoDbBuilder;
//!
//! let xml = std::fs::read("listxml.xml")?;
//! let mut builder = InfoDbBuilder::new();
//! builder.process_xml(xml.as_slice(), None, None)?;
//! std::fs::write("machines.infodb", builder.to_bytes()?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{BufRead, Write};
use std::sync::atomic::AtomicBool;

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use zerocopy::IntoBytes;

use cabinet_common::{hex, narrow_u32, salt};

use crate::error::lift_overflow;
use crate::structs::*;
use crate::types::*;
use crate::xml::{Attributes, XmlHandler, XmlParser};
use crate::{Error, Result, StringRef, StringTable, NOT_FOUND};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Progress reported after each machine element is complete.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Machines ingested so far.
    pub machine_count: usize,
    pub name: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Fresh,
    Built,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Mame,
    Machine,
    Description,
    Year,
    Manufacturer,
    Biosset,
    Rom,
    Disk,
    Device,
    DeviceInstance,
    DeviceExtension,
    Driver,
    Feature,
    Chip,
    Display,
    Sample,
    Sound,
    Configuration,
    ConfigurationSetting,
    ConfigurationCondition,
    Slot,
    SlotOption,
    SoftwareList,
    RamOption,
}

/// Builder for info databases.
///
/// A builder is single-use: it ingests exactly one document. Once a build
/// fails or is cancelled, nothing can be emitted from it.
#[derive(Debug)]
pub struct InfoDbBuilder {
    state: BuildState,
    salted_header: Header,
    counts: TableCounts,

    machines: Vec<Machine>,
    biossets: Vec<Biosset>,
    roms: Vec<Rom>,
    disks: Vec<Disk>,
    devices: Vec<Device>,
    slots: Vec<Slot>,
    slot_options: Vec<SlotOption>,
    features: Vec<Feature>,
    chips: Vec<Chip>,
    displays: Vec<Display>,
    samples: Vec<Sample>,
    configurations: Vec<Configuration>,
    configuration_settings: Vec<ConfigurationSetting>,
    configuration_conditions: Vec<ConfigurationCondition>,
    software_lists: Vec<SoftwareList>,
    ram_options: Vec<RamOption>,

    strings: StringTable,
    build: StringRef,
}

impl Default for InfoDbBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InfoDbBuilder {
    /// Create a builder sized for a full emulator catalogue.
    pub fn new() -> Self {
        let mut strings = StringTable::with_capacity(4_500_000, 300_000);
        strings.embed_value(MAGIC_STRINGTABLE_BEGIN);

        Self {
            state: BuildState::Fresh,
            salted_header: Header::default(),
            counts: TableCounts::default(),
            machines: Vec::with_capacity(48_000),
            biossets: Vec::with_capacity(36_000),
            roms: Vec::with_capacity(350_000),
            disks: Vec::with_capacity(1_400),
            devices: Vec::with_capacity(11_000),
            slots: Vec::new(),
            slot_options: Vec::new(),
            features: Vec::with_capacity(22_000),
            chips: Vec::with_capacity(180_000),
            displays: Vec::new(),
            samples: Vec::with_capacity(20_000),
            configurations: Vec::with_capacity(600_000),
            configuration_settings: Vec::with_capacity(1_700_000),
            configuration_conditions: Vec::with_capacity(7_500),
            software_lists: Vec::with_capacity(6_200),
            ram_options: Vec::with_capacity(6_500),
            strings,
            build: StringRef::EMPTY,
        }
    }

    fn parser() -> XmlParser<Element> {
        const M: &str = "mame";
        const MA: &str = "machine";

        let mut xml = XmlParser::new();
        xml.on_begin(&[&[M]], Element::Mame)
            .on_begin(&[&[M, MA]], Element::Machine)
            .on_end(&[&[M, MA]], Element::Machine)
            .on_end(&[&[M, MA, "description"]], Element::Description)
            .on_end(&[&[M, MA, "year"]], Element::Year)
            .on_end(&[&[M, MA, "manufacturer"]], Element::Manufacturer)
            .on_begin(&[&[M, MA, "biosset"]], Element::Biosset)
            .on_begin(&[&[M, MA, "rom"]], Element::Rom)
            .on_begin(&[&[M, MA, "disk"]], Element::Disk)
            .on_begin(&[&[M, MA, "device"]], Element::Device)
            .on_end(&[&[M, MA, "device"]], Element::Device)
            .on_begin(&[&[M, MA, "device", "instance"]], Element::DeviceInstance)
            .on_begin(&[&[M, MA, "device", "extension"]], Element::DeviceExtension)
            .on_begin(&[&[M, MA, "driver"]], Element::Driver)
            .on_begin(&[&[M, MA, "feature"]], Element::Feature)
            .on_begin(&[&[M, MA, "chip"]], Element::Chip)
            .on_begin(&[&[M, MA, "display"]], Element::Display)
            .on_begin(&[&[M, MA, "sample"]], Element::Sample)
            .on_begin(&[&[M, MA, "sound"]], Element::Sound)
            .on_begin(
                &[&[M, MA, "configuration"], &[M, MA, "dipswitch"]],
                Element::Configuration,
            )
            .on_begin(
                &[&[M, MA, "configuration", "confsetting"], &[M, MA, "dipswitch", "dipvalue"]],
                Element::ConfigurationSetting,
            )
            .on_begin(
                &[
                    &[M, MA, "configuration", "confsetting", "condition"],
                    &[M, MA, "dipswitch", "dipvalue", "condition"],
                ],
                Element::ConfigurationCondition,
            )
            .on_begin(&[&[M, MA, "slot"]], Element::Slot)
            .on_begin(&[&[M, MA, "slot", "slotoption"]], Element::SlotOption)
            .on_begin(&[&[M, MA, "softwarelist"]], Element::SoftwareList)
            .on_begin(&[&[M, MA, "ramoption"]], Element::RamOption)
            .on_end(&[&[M, MA, "ramoption"]], Element::RamOption);
        xml
    }

    /// Ingest a `-listxml` document and finalize the database.
    ///
    /// `progress` is called after every machine. Setting `cancel` stops the
    /// build with [`Error::Cancelled`].
    pub fn process_xml<R: BufRead>(
        &mut self,
        input: R,
        progress: Option<&mut dyn FnMut(&Progress<'_>)>,
        cancel: Option<&AtomicBool>,
    ) -> Result<()> {
        if self.state != BuildState::Fresh {
            return Err(Error::BuilderReused);
        }
        // Poisoned until the build completes.
        self.state = BuildState::Failed;

        let mut ingest = Ingest { builder: self, device_extensions: String::new(), progress };
        Self::parser().parse(input, &mut ingest, cancel)?;

        self.finalize()?;
        self.state = BuildState::Built;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.strings.embed_value(MAGIC_STRINGTABLE_END);

        self.counts = TableCounts {
            machines: narrow(self.machines.len())?,
            biossets: narrow(self.biossets.len())?,
            roms: narrow(self.roms.len())?,
            disks: narrow(self.disks.len())?,
            devices: narrow(self.devices.len())?,
            slots: narrow(self.slots.len())?,
            slot_options: narrow(self.slot_options.len())?,
            features: narrow(self.features.len())?,
            chips: narrow(self.chips.len())?,
            displays: narrow(self.displays.len())?,
            samples: narrow(self.samples.len())?,
            configurations: narrow(self.configurations.len())?,
            configuration_settings: narrow(self.configuration_settings.len())?,
            configuration_conditions: narrow(self.configuration_conditions.len())?,
            software_lists: narrow(self.software_lists.len())?,
            ram_options: narrow(self.ram_options.len())?,
        };
        narrow(self.strings.byte_len())?;

        let header = Header {
            magic: MAGIC_HDR,
            sizes_hash: layout_hash(),
            build: self.build,
            counts: self.counts,
        };
        self.salted_header = salt::salt(&header, &PEPPER);

        let strings = &self.strings;
        self.machines.sort_by(|a, b| {
            strings.lookup(a.name).as_bytes().cmp(strings.lookup(b.name).as_bytes())
        });

        // Interning is canonical, so equal names share a reference.
        let mut by_name: FxHashMap<u32, u32> =
            FxHashMap::with_capacity_and_hasher(self.machines.len(), Default::default());
        for (index, machine) in self.machines.iter().enumerate() {
            by_name.entry(machine.name.raw()).or_insert(index as u32);
        }
        by_name.remove(&StringRef::EMPTY.raw());

        let resolve = |raw: u32| by_name.get(&raw).copied().unwrap_or(NOT_FOUND);
        for machine in &mut self.machines {
            machine.clone_of = resolve(machine.clone_of);
            machine.rom_of = resolve(machine.rom_of);
        }

        tracing::info!(
            machines = { self.counts.machines },
            roms = { self.counts.roms },
            string_bytes = self.strings.byte_len(),
            "info database built"
        );
        Ok(())
    }

    /// Check whether a build completed and can be emitted.
    pub fn is_built(&self) -> bool {
        self.state == BuildState::Built
    }

    /// Record counts of the completed build.
    pub fn counts(&self) -> TableCounts {
        self.counts
    }

    /// The string table built so far.
    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// Write the database.
    pub fn emit_info<W: Write>(&self, output: &mut W) -> Result<()> {
        if !self.is_built() {
            return Err(Error::NotBuilt);
        }

        output.write_all(self.salted_header.as_bytes())?;
        output.write_all(self.machines.as_bytes())?;
        output.write_all(self.biossets.as_bytes())?;
        output.write_all(self.roms.as_bytes())?;
        output.write_all(self.disks.as_bytes())?;
        output.write_all(self.devices.as_bytes())?;
        output.write_all(self.slots.as_bytes())?;
        output.write_all(self.slot_options.as_bytes())?;
        output.write_all(self.features.as_bytes())?;
        output.write_all(self.chips.as_bytes())?;
        output.write_all(self.displays.as_bytes())?;
        output.write_all(self.samples.as_bytes())?;
        output.write_all(self.configurations.as_bytes())?;
        output.write_all(self.configuration_settings.as_bytes())?;
        output.write_all(self.configuration_conditions.as_bytes())?;
        output.write_all(self.software_lists.as_bytes())?;
        output.write_all(self.ram_options.as_bytes())?;
        output.write_all(self.strings.data())?;
        Ok(())
    }

    /// Write the database into a new buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.emit_info(&mut buffer)?;
        Ok(buffer)
    }
}

fn narrow(value: usize) -> Result<u32> {
    narrow_u32(value).map_err(lift_overflow)
}

fn span_at<T>(table: &[T]) -> Result<Span> {
    Ok(Span::at(narrow(table.len())?))
}

fn last<'a, T>(table: &'a mut [T], element: &str) -> Result<&'a mut T> {
    table
        .last_mut()
        .ok_or_else(|| Error::xml(0, format!("<{element}> outside of its parent")))
}

/// Per-ingestion state driven by the XML parser.
struct Ingest<'a, 'p> {
    builder: &'a mut InfoDbBuilder,
    device_extensions: String,
    progress: Option<&'p mut dyn FnMut(&Progress<'_>)>,
}

impl Ingest<'_, '_> {
    fn string(&mut self, attributes: &Attributes<'_>, name: &str) -> Result<StringRef> {
        match attributes.get(name) {
            Some(value) => self.builder.strings.intern(&value),
            None => Ok(StringRef::EMPTY),
        }
    }

    fn machine(&mut self) -> Result<&mut Machine> {
        last(&mut self.builder.machines, "machine")
    }

    fn begin_machine(&mut self, a: &Attributes<'_>) -> Result<()> {
        let b = &*self.builder;
        let machine = Machine {
            name: StringRef::EMPTY,
            sourcefile: StringRef::EMPTY,
            clone_of: 0,
            rom_of: 0,
            description: StringRef::EMPTY,
            year: StringRef::EMPTY,
            manufacturer: StringRef::EMPTY,
            biossets: span_at(&b.biossets)?,
            roms: span_at(&b.roms)?,
            disks: span_at(&b.disks)?,
            devices: span_at(&b.devices)?,
            slots: span_at(&b.slots)?,
            features: span_at(&b.features)?,
            chips: span_at(&b.chips)?,
            displays: span_at(&b.displays)?,
            samples: span_at(&b.samples)?,
            configurations: span_at(&b.configurations)?,
            software_lists: span_at(&b.software_lists)?,
            ram_options: span_at(&b.ram_options)?,
            runnable: Tristate::from(a.get_bool("runnable").unwrap_or(true)) as u8,
            is_bios: Tristate::from(a.get_bool("isbios")) as u8,
            is_device: Tristate::from(a.get_bool("isdevice")) as u8,
            is_mechanical: Tristate::from(a.get_bool("ismechanical")) as u8,
            quality_status: DriverQuality::default() as u8,
            quality_emulation: DriverQuality::default() as u8,
            quality_cocktail: DriverQuality::default() as u8,
            save_state_supported: Tristate::Unspecified as u8,
            unofficial: Tristate::Unspecified as u8,
            incomplete: Tristate::Unspecified as u8,
            sound_channels: u8::MAX,
        };
        let name = self.string(a, "name")?;
        let sourcefile = self.string(a, "sourcefile")?;
        // String references until finalization rewrites them to indices.
        let clone_of = self.string(a, "cloneof")?;
        let rom_of = self.string(a, "romof")?;

        self.builder.machines.push(Machine {
            name,
            sourcefile,
            clone_of: clone_of.raw(),
            rom_of: rom_of.raw(),
            ..machine
        });
        Ok(())
    }

    fn end_machine(&mut self) -> Result<()> {
        let Some(progress) = self.progress.as_deref_mut() else {
            return Ok(());
        };
        let b = &*self.builder;
        let Some(machine) = b.machines.last() else {
            return Ok(());
        };
        progress(&Progress {
            machine_count: b.machines.len(),
            name: &b.strings.lookup(machine.name),
            description: &b.strings.lookup(machine.description),
        });
        Ok(())
    }

    fn begin_rom(&mut self, a: &Attributes<'_>) -> Result<()> {
        let size = a.get_u64("size").map(narrow_u32).transpose().map_err(lift_overflow)?;
        let (crc, crc_ok) = hex::decode_fixed::<4>(a.get("crc").as_deref());
        let (sha1, sha1_ok) = hex::decode_fixed::<20>(a.get("sha1").as_deref());
        let status = a.get_with("status", DumpStatus::from_token).unwrap_or_default();

        let name = self.string(a, "name")?;
        if (a.get("crc").is_some() && !crc_ok) || (a.get("sha1").is_some() && !sha1_ok) {
            tracing::debug!(rom = %self.builder.strings.lookup(name), "malformed ROM checksum");
        }

        let rom = Rom {
            name,
            bios: self.string(a, "bios")?,
            size: size.unwrap_or(0),
            merge: self.string(a, "merge")?,
            region: self.string(a, "region")?,
            offset: a.get_u64_radix("offset", 16).unwrap_or(0),
            crc,
            sha1,
            status: status as u8,
            optional: Tristate::from(a.get_bool("optional").unwrap_or(false)) as u8,
        };
        self.builder.roms.push(rom);
        self.machine()?.roms.count += 1;
        Ok(())
    }

    fn begin_disk(&mut self, a: &Attributes<'_>) -> Result<()> {
        let (sha1, sha1_ok) = hex::decode_fixed::<20>(a.get("sha1").as_deref());
        let name = self.string(a, "name")?;
        if a.get("sha1").is_some() && !sha1_ok {
            tracing::debug!(disk = %self.builder.strings.lookup(name), "malformed disk checksum");
        }

        let disk = Disk {
            name,
            merge: self.string(a, "merge")?,
            region: self.string(a, "region")?,
            index: a.get_u32("index").unwrap_or(0),
            sha1,
            writable: Tristate::from(a.get_bool("writable").unwrap_or(false)) as u8,
            status: a.get_with("status", DumpStatus::from_token).unwrap_or_default() as u8,
            optional: Tristate::from(a.get_bool("optional").unwrap_or(false)) as u8,
        };
        self.builder.disks.push(disk);
        self.machine()?.disks.count += 1;
        Ok(())
    }

    fn begin_device(&mut self, a: &Attributes<'_>) -> Result<()> {
        let device = Device {
            type_: self.string(a, "type")?,
            tag: self.string(a, "tag")?,
            interface: self.string(a, "interface")?,
            instance_name: StringRef::EMPTY,
            extensions: StringRef::EMPTY,
            mandatory: Tristate::from(a.get_bool("mandatory").unwrap_or(false)) as u8,
        };
        self.builder.devices.push(device);
        self.device_extensions.clear();
        self.machine()?.devices.count += 1;
        Ok(())
    }

    fn end_device(&mut self) -> Result<()> {
        if self.device_extensions.is_empty() {
            return Ok(());
        }
        let extensions = self.builder.strings.intern(&self.device_extensions)?;
        last(&mut self.builder.devices, "device")?.extensions = extensions;
        Ok(())
    }

    fn begin_driver(&mut self, a: &Attributes<'_>) -> Result<()> {
        let quality = |name: &str, current: u8| {
            a.get_with(name, DriverQuality::from_token).map_or(current, |q| q as u8)
        };
        let keep = |current: u8, value: Option<bool>| Tristate::from_u8(current).or_keep(value) as u8;

        let machine = self.machine()?;
        machine.quality_status = quality("status", machine.quality_status);
        machine.quality_emulation = quality("emulation", machine.quality_emulation);
        machine.quality_cocktail = quality("cocktail", machine.quality_cocktail);
        machine.save_state_supported =
            keep(machine.save_state_supported, a.get_with("savestate", parse_supported));
        machine.unofficial = keep(machine.unofficial, a.get_bool("unofficial"));
        machine.incomplete = keep(machine.incomplete, a.get_bool("incomplete"));
        Ok(())
    }

    fn begin_display(&mut self, a: &Attributes<'_>) -> Result<()> {
        let display = Display {
            tag: self.string(a, "tag")?,
            width: a.get_u32("width").unwrap_or(u32::MAX),
            height: a.get_u32("height").unwrap_or(u32::MAX),
            refresh: a.get_f32("refresh").unwrap_or(f32::NAN),
            pixclock: a.get_u64("pixclock").unwrap_or(u64::MAX),
            htotal: a.get_u32("htotal").unwrap_or(u32::MAX),
            hbend: a.get_u32("hbend").unwrap_or(u32::MAX),
            hbstart: a.get_u32("hbstart").unwrap_or(u32::MAX),
            vtotal: a.get_u32("vtotal").unwrap_or(u32::MAX),
            vbend: a.get_u32("vbend").unwrap_or(u32::MAX),
            vbstart: a.get_u32("vbstart").unwrap_or(u32::MAX),
            type_: a.get_with("type", DisplayType::from_token).unwrap_or_default() as u8,
            rotate: a.get_with("rotate", Rotation::from_token).unwrap_or_default() as u8,
            flipx: Tristate::from(a.get_bool("flipx")) as u8,
        };
        self.builder.displays.push(display);
        self.machine()?.displays.count += 1;
        Ok(())
    }

    fn begin_configuration(&mut self, a: &Attributes<'_>) -> Result<()> {
        let configuration = Configuration {
            name: self.string(a, "name")?,
            tag: self.string(a, "tag")?,
            mask: a.get_u32("mask").unwrap_or(0),
            settings: span_at(&self.builder.configuration_settings)?,
        };
        self.builder.configurations.push(configuration);
        self.machine()?.configurations.count += 1;
        Ok(())
    }

    fn begin_configuration_setting(&mut self, a: &Attributes<'_>) -> Result<()> {
        let setting = ConfigurationSetting {
            name: self.string(a, "name")?,
            value: a.get_u32("value").unwrap_or(0),
            conditions: span_at(&self.builder.configuration_conditions)?,
        };
        self.builder.configuration_settings.push(setting);
        last(&mut self.builder.configurations, "configuration")?.settings.count += 1;
        Ok(())
    }

    fn begin_configuration_condition(&mut self, a: &Attributes<'_>) -> Result<()> {
        let condition = ConfigurationCondition {
            tag: self.string(a, "tag")?,
            mask: a.get_u32("mask").unwrap_or(0),
            value: a.get_u32("value").unwrap_or(0),
            relation: a.get_with("relation", Relation::from_token).unwrap_or_default() as u8,
        };
        self.builder.configuration_conditions.push(condition);
        last(&mut self.builder.configuration_settings, "confsetting")?.conditions.count += 1;
        Ok(())
    }

    fn begin_slot(&mut self, a: &Attributes<'_>) -> Result<()> {
        let slot = Slot {
            name: self.string(a, "name")?,
            slot_options: span_at(&self.builder.slot_options)?,
        };
        self.builder.slots.push(slot);
        self.machine()?.slots.count += 1;
        Ok(())
    }
}

impl XmlHandler<Element> for Ingest<'_, '_> {
    fn begin(&mut self, key: Element, a: &Attributes<'_>) -> Result<()> {
        match key {
            Element::Mame => {
                self.builder.build = self.string(a, "build")?;
            }
            Element::Machine => self.begin_machine(a)?,
            Element::Biosset => {
                let biosset = Biosset {
                    name: self.string(a, "name")?,
                    description: self.string(a, "description")?,
                    default: Tristate::from(a.get_bool("default").unwrap_or(false)) as u8,
                };
                self.builder.biossets.push(biosset);
                self.machine()?.biossets.count += 1;
            }
            Element::Rom => self.begin_rom(a)?,
            Element::Disk => self.begin_disk(a)?,
            Element::Device => self.begin_device(a)?,
            Element::DeviceInstance => {
                let name = self.string(a, "name")?;
                last(&mut self.builder.devices, "device")?.instance_name = name;
            }
            Element::DeviceExtension => {
                if let Some(name) = a.get("name") {
                    self.device_extensions.push_str(&name);
                    self.device_extensions.push(',');
                }
            }
            Element::Driver => self.begin_driver(a)?,
            Element::Feature => {
                let feature = Feature {
                    type_: a.get_with("type", FeatureType::from_token).unwrap_or_default() as u8,
                    status: a.get_with("status", FeatureQuality::from_token).unwrap_or_default()
                        as u8,
                    overall: a.get_with("overall", FeatureQuality::from_token).unwrap_or_default()
                        as u8,
                };
                self.builder.features.push(feature);
                self.machine()?.features.count += 1;
            }
            Element::Chip => {
                let chip = Chip {
                    name: self.string(a, "name")?,
                    tag: self.string(a, "tag")?,
                    clock: a.get_u64("clock").unwrap_or(0),
                    type_: a.get_with("type", ChipType::from_token).unwrap_or_default() as u8,
                };
                self.builder.chips.push(chip);
                self.machine()?.chips.count += 1;
            }
            Element::Display => self.begin_display(a)?,
            Element::Sample => {
                let sample = Sample { name: self.string(a, "name")? };
                self.builder.samples.push(sample);
                self.machine()?.samples.count += 1;
            }
            Element::Sound => {
                self.machine()?.sound_channels = a.get_u8("channels").unwrap_or(u8::MAX);
            }
            Element::Configuration => self.begin_configuration(a)?,
            Element::ConfigurationSetting => self.begin_configuration_setting(a)?,
            Element::ConfigurationCondition => self.begin_configuration_condition(a)?,
            Element::Slot => self.begin_slot(a)?,
            Element::SlotOption => {
                let option = SlotOption {
                    name: self.string(a, "name")?,
                    devname: self.string(a, "devname")?,
                    is_default: Tristate::from(a.get_bool("default").unwrap_or(false)) as u8,
                };
                self.builder.slot_options.push(option);
                last(&mut self.builder.slots, "slot")?.slot_options.count += 1;
            }
            Element::SoftwareList => {
                let list = SoftwareList {
                    name: self.string(a, "name")?,
                    filter: self.string(a, "filter")?,
                    status: a.get_with("status", SoftwareListStatus::from_token).unwrap_or_default()
                        as u8,
                };
                self.builder.software_lists.push(list);
                self.machine()?.software_lists.count += 1;
            }
            Element::RamOption => {
                let option = RamOption {
                    name: self.string(a, "name")?,
                    value: 0,
                    is_default: Tristate::from(a.get_bool("default").unwrap_or(false)) as u8,
                };
                self.builder.ram_options.push(option);
                self.machine()?.ram_options.count += 1;
            }
            Element::Description | Element::Year | Element::Manufacturer => {}
        }
        Ok(())
    }

    fn end(&mut self, key: Element, text: String) -> Result<()> {
        match key {
            Element::Machine => self.end_machine()?,
            Element::Description => {
                let description = self.builder.strings.intern(&text)?;
                self.machine()?.description = description;
            }
            Element::Year => {
                let year = self.builder.strings.intern(&text)?;
                self.machine()?.year = year;
            }
            Element::Manufacturer => {
                let manufacturer = self.builder.strings.intern(&text)?;
                self.machine()?.manufacturer = manufacturer;
            }
            Element::Device => self.end_device()?,
            Element::RamOption => {
                let value = text.trim().parse().unwrap_or(0);
                last(&mut self.builder.ram_options, "ramoption")?.value = value;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InfoDatabase;

    fn build(xml: &str) -> Result<InfoDbBuilder> {
        let mut builder = InfoDbBuilder::new();
        builder.process_xml(xml.as_bytes(), None, None)?;
        Ok(builder)
    }

    #[test]
    fn test_child_ranges_are_contiguous() {
        let builder = build(
            r#"<mame build="0.261">
                <machine name="one"><rom name="a"/><rom name="b"/><chip name="z80" type="cpu"/></machine>
                <machine name="two"><chip name="ym2151" type="audio"/><rom name="c"/></machine>
                <machine name="three"/>
            </mame>"#,
        )
        .unwrap();

        let names: Vec<_> = builder
            .machines
            .iter()
            .map(|m| (builder.strings.lookup(m.name).to_owned_string(), m.roms, m.chips))
            .collect();
        assert_eq!(names[0], ("one".to_owned(), Span { index: 0, count: 2 }, Span { index: 0, count: 1 }));
        assert_eq!(names[1], ("three".to_owned(), Span { index: 3, count: 0 }, Span { index: 2, count: 0 }));
        assert_eq!(names[2], ("two".to_owned(), Span { index: 2, count: 1 }, Span { index: 1, count: 1 }));
    }

    #[test]
    fn test_rom_size_overflow_is_fatal() {
        let xml = |size: u64| {
            format!(r#"<mame><machine name="big"><rom name="huge" size="{size}"/></machine></mame>"#)
        };

        let builder = build(&xml(u32::MAX as u64)).unwrap();
        assert_eq!({ builder.roms[0].size }, u32::MAX);

        let mut builder = InfoDbBuilder::new();
        let err = builder.process_xml(xml(1 << 32).as_bytes(), None, None).unwrap_err();
        assert!(matches!(err, Error::Overflow { value, bits: 32 } if value == 1 << 32));
        assert!(matches!(builder.to_bytes(), Err(Error::NotBuilt)));
    }

    #[test]
    fn test_builder_is_single_use() {
        let mut builder = build("<mame/>").unwrap();
        let err = builder.process_xml("<mame/>".as_bytes(), None, None).unwrap_err();
        assert!(matches!(err, Error::BuilderReused));
        assert!(builder.to_bytes().is_ok());
    }

    #[test]
    fn test_cancelled_build_cannot_emit() {
        let cancel = AtomicBool::new(true);
        let mut builder = InfoDbBuilder::new();
        let err = builder.process_xml("<mame/>".as_bytes(), None, Some(&cancel)).unwrap_err();
        assert!(err.is_cancelled());
        assert!(matches!(builder.to_bytes(), Err(Error::NotBuilt)));
    }

    #[test]
    fn test_progress_reports_each_machine() {
        let xml = r#"<mame>
            <machine name="pacman"><description>Pac-Man (Midway)</description></machine>
            <machine name="mspacman"><description>Ms. Pac-Man</description></machine>
        </mame>"#;
        let mut seen = Vec::new();
        let mut on_progress = |p: &Progress<'_>| {
            seen.push((p.machine_count, p.name.to_owned(), p.description.to_owned()));
        };
        let mut builder = InfoDbBuilder::new();
        builder.process_xml(xml.as_bytes(), Some(&mut on_progress), None).unwrap();

        assert_eq!(
            seen,
            vec![
                (1, "pacman".to_owned(), "Pac-Man (Midway)".to_owned()),
                (2, "mspacman".to_owned(), "Ms. Pac-Man".to_owned()),
            ]
        );
    }

    #[test]
    fn test_defaults_and_driver_attributes() {
        let builder = build(
            r#"<mame>
                <machine name="puckman" runnable="no">
                    <driver status="imperfect" emulation="good" savestate="supported"/>
                    <display type="raster" rotate="90" width="288"/>
                    <sound channels="1"/>
                    <device type="cartridge" tag="cart">
                        <instance name="cartridge"/>
                        <extension name="bin"/><extension name="rom"/>
                    </device>
                    <ramoption default="yes">65536</ramoption>
                </machine>
            </mame>"#,
        )
        .unwrap();

        let m = builder.machines[0];
        assert_eq!({ m.runnable }, Tristate::False as u8);
        assert_eq!({ m.is_bios }, Tristate::Unspecified as u8);
        assert_eq!({ m.quality_status }, DriverQuality::Imperfect as u8);
        assert_eq!({ m.quality_emulation }, DriverQuality::Good as u8);
        assert_eq!({ m.quality_cocktail }, DriverQuality::Unknown as u8);
        assert_eq!({ m.save_state_supported }, Tristate::True as u8);
        assert_eq!({ m.unofficial }, Tristate::Unspecified as u8);
        assert_eq!({ m.sound_channels }, 1);

        let d = builder.displays[0];
        assert_eq!({ d.width }, 288);
        assert_eq!({ d.height }, u32::MAX);
        assert!({ d.refresh }.is_nan());
        assert_eq!({ d.rotate }, Rotation::Rot90 as u8);

        let dev = builder.devices[0];
        assert_eq!(builder.strings.lookup(dev.extensions), "bin,rom,");
        assert_eq!(builder.strings.lookup(dev.instance_name), "cartridge");
        assert_eq!({ builder.ram_options[0].value }, 65536);
    }

    #[test]
    fn test_dipswitch_aliases_configuration() {
        let builder = build(
            r#"<mame>
                <machine name="galaxian">
                    <dipswitch name="Lives" tag="IN2" mask="4">
                        <dipvalue name="2" value="0"/>
                        <dipvalue name="3" value="4">
                            <condition tag="IN2" mask="8" relation="ne" value="0"/>
                        </dipvalue>
                    </dipswitch>
                    <configuration name="Cabinet" tag="IN3" mask="1">
                        <confsetting name="Upright" value="0"/>
                    </configuration>
                </machine>
            </mame>"#,
        )
        .unwrap();

        assert_eq!({ builder.machines[0].configurations }, Span { index: 0, count: 2 });
        assert_eq!({ builder.configurations[0].settings }, Span { index: 0, count: 2 });
        assert_eq!({ builder.configurations[1].settings }, Span { index: 2, count: 1 });
        assert_eq!({ builder.configuration_settings[1].conditions }, Span { index: 0, count: 1 });
        assert_eq!({ builder.configuration_conditions[0].relation }, Relation::Ne as u8);
    }

    #[test]
    fn test_emitted_bytes_load() {
        let builder = build(r#"<mame build="0.261 (mame0261)"><machine name="pong"/></mame>"#).unwrap();
        let db = InfoDatabase::from_bytes(builder.to_bytes().unwrap(), None).unwrap();
        assert_eq!(db.version(), "0.261 (mame0261)");
        assert_eq!(db.machines().len(), 1);
    }
}
