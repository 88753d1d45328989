//! Byte-level PE image builder for tests.
//!
//! Produces a complete, loadable-looking image with a `.text` section, an `.rdata` section
//! holding the export and import tables and an optional `.reloc` section. Every table is
//! written at a known RVA so tests can corrupt individual fields afterwards.

use crate::pe::{
    CoffHeader, DataDirectory, DataDirectoryType, ExportDirectory, FileCharacteristics,
    SectionCharacteristics, SectionHeader, DOS_MAGIC, MACHINE_AMD64, MACHINE_I386,
    PE32_MAGIC, PE32_PLUS_MAGIC, PE_SIGNATURE,
};

pub const FILE_ALIGNMENT: u32 = 0x200;
pub const SECTION_ALIGNMENT: u32 = 0x1000;
pub const E_LFANEW: usize = 0x40;
pub const HEADERS_SIZE: u32 = 0x400;
pub const TEXT_RVA: u32 = 0x1000;
pub const RDATA_RVA: u32 = 0x2000;

/// Content of the export directory to emit
#[derive(Debug, Clone)]
pub struct ExportSpec {
    pub dll_name: String,
    pub base: u32,
    pub addresses: Vec<u32>,
    /// `(function index, name)` pairs, written in this order
    pub names: Vec<(u16, String)>,
}

impl Default for ExportSpec {
    fn default() -> Self {
        ExportSpec {
            dll_name: "test.dll".to_string(),
            base: 1,
            addresses: Vec::new(),
            names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ImportSymbol {
    Name { hint: u16, name: String },
    Ordinal(u16),
}

/// One import descriptor and its thunks
#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub dll: String,
    pub symbols: Vec<ImportSymbol>,
}

/// A built image with the layout facts tests need
pub struct Image {
    pub data: Vec<u8>,
    pub sections: Vec<SectionHeader>,
    pub pe32_plus: bool,
    pub optional_header_offset: usize,
    pub export_offset: Option<usize>,
    pub import: Option<DataDirectory>,
    pub relocations: Option<DataDirectory>,
}

impl Image {
    /// The export directory as written, panics if the image has none.
    pub fn export_directory(&self) -> ExportDirectory {
        let offset = self.export_offset.expect("image was built without exports");
        ExportDirectory::decode(&self.data, offset).unwrap()
    }

    pub fn import_directory(&self) -> Option<DataDirectory> {
        self.import
    }

    /// File offset of the data directory entry `kind`.
    pub fn data_directory_offset(&self, kind: DataDirectoryType) -> usize {
        let fixed = if self.pe32_plus { 112 } else { 96 };
        self.optional_header_offset + fixed + kind as usize * DataDirectory::SIZE
    }

    /// Overwrite a little-endian u32 at `offset`.
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Encode a relocation block with an explicit `SizeOfBlock`.
pub fn relocation_block(virtual_address: u32, size_of_block: u32, words: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + words.len() * 2);
    out.extend_from_slice(&virtual_address.to_le_bytes());
    out.extend_from_slice(&size_of_block.to_le_bytes());
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out
}

/// A growing section body that knows its own RVA.
struct Blob {
    rva: u32,
    bytes: Vec<u8>,
}

impl Blob {
    fn here(&self) -> u32 {
        self.rva + self.bytes.len() as u32
    }

    fn put_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn put_cstr(&mut self, value: &str) -> u32 {
        let rva = self.here();
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
        rva
    }

    fn align(&mut self, to: usize) {
        while self.bytes.len() % to != 0 {
            self.bytes.push(0);
        }
    }

    fn patch_u32(&mut self, rva: u32, value: u32) {
        let at = (rva - self.rva) as usize;
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

fn align_up(value: u32, to: u32) -> u32 {
    value.div_ceil(to) * to
}

#[derive(Default)]
pub struct ImageBuilder {
    pe32_plus: bool,
    exports: Option<ExportSpec>,
    imports: Vec<ImportSpec>,
    relocations: Option<Vec<u8>>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        ImageBuilder::default()
    }

    pub fn pe32_plus(mut self, pe32_plus: bool) -> Self {
        self.pe32_plus = pe32_plus;
        self
    }

    pub fn exports(mut self, exports: ExportSpec) -> Self {
        self.exports = Some(exports);
        self
    }

    pub fn import(mut self, import: ImportSpec) -> Self {
        self.imports.push(import);
        self
    }

    /// Raw bytes of the base relocation directory, see [`relocation_block`].
    pub fn relocations(mut self, bytes: Vec<u8>) -> Self {
        self.relocations = Some(bytes);
        self
    }

    fn write_exports(spec: &ExportSpec, rdata: &mut Blob) -> DataDirectory {
        let start = rdata.here();
        rdata.bytes.extend_from_slice(&[0u8; ExportDirectory::SIZE]);

        let address_of_functions = rdata.here();
        for address in &spec.addresses {
            rdata.put_u32(*address);
        }
        let address_of_names = rdata.here();
        for _ in &spec.names {
            rdata.put_u32(0);
        }
        let address_of_name_ordinals = rdata.here();
        for (index, _) in &spec.names {
            rdata.put_u16(*index);
        }

        let dll_name = rdata.put_cstr(&spec.dll_name);
        for (slot, (_, name)) in spec.names.iter().enumerate() {
            let name_rva = rdata.put_cstr(name);
            rdata.patch_u32(address_of_names + slot as u32 * 4, name_rva);
        }

        let directory = ExportDirectory {
            name: dll_name,
            base: spec.base,
            number_of_functions: spec.addresses.len() as u32,
            number_of_names: spec.names.len() as u32,
            address_of_functions,
            address_of_names,
            address_of_name_ordinals,
            ..ExportDirectory::default()
        };
        let at = (start - rdata.rva) as usize;
        directory.encode(&mut rdata.bytes, at).unwrap();
        rdata.align(4);

        DataDirectory {
            virtual_address: start,
            size: rdata.here() - start,
        }
    }

    fn write_imports(&self, rdata: &mut Blob) -> DataDirectory {
        let start = rdata.here();
        let descriptors = rdata.here();
        rdata
            .bytes
            .resize(rdata.bytes.len() + (self.imports.len() + 1) * 20, 0);

        for (index, import) in self.imports.iter().enumerate() {
            let name = rdata.put_cstr(&import.dll);
            rdata.align(2);

            let thunks: Vec<u64> = import
                .symbols
                .iter()
                .map(|symbol| match symbol {
                    ImportSymbol::Ordinal(ordinal) => {
                        let flag = if self.pe32_plus { 1u64 << 63 } else { 1u64 << 31 };
                        flag | u64::from(*ordinal)
                    }
                    ImportSymbol::Name { hint, name } => {
                        let rva = rdata.here();
                        rdata.put_u16(*hint);
                        rdata.put_cstr(name);
                        rdata.align(2);
                        u64::from(rva)
                    }
                })
                .collect();

            rdata.align(8);
            let mut tables = [0u32; 2];
            for table in &mut tables {
                *table = rdata.here();
                for thunk in thunks.iter().copied().chain(std::iter::once(0)) {
                    if self.pe32_plus {
                        rdata.put_u64(thunk);
                    } else {
                        rdata.put_u32(thunk as u32);
                    }
                }
            }

            let descriptor = descriptors + index as u32 * 20;
            rdata.patch_u32(descriptor, tables[0]);
            rdata.patch_u32(descriptor + 12, name);
            rdata.patch_u32(descriptor + 16, tables[1]);
        }
        rdata.align(4);

        DataDirectory {
            virtual_address: start,
            size: (self.imports.len() as u32 + 1) * 20,
        }
    }

    pub fn build(self) -> Image {
        let mut rdata = Blob {
            rva: RDATA_RVA,
            bytes: Vec::new(),
        };

        let export = self
            .exports
            .as_ref()
            .map(|spec| Self::write_exports(spec, &mut rdata));
        let import = (!self.imports.is_empty()).then(|| self.write_imports(&mut rdata));
        if rdata.bytes.is_empty() {
            rdata.put_u32(0);
        }

        // (name, rva, body, characteristics)
        let mut bodies = vec![
            (
                *b".text\0\0\0",
                TEXT_RVA,
                vec![0xC3u8; 0x10],
                (SectionCharacteristics::CNT_CODE
                    | SectionCharacteristics::MEM_EXECUTE
                    | SectionCharacteristics::MEM_READ)
                    .bits(),
            ),
            (
                *b".rdata\0\0",
                RDATA_RVA,
                rdata.bytes,
                (SectionCharacteristics::CNT_INITIALIZED_DATA | SectionCharacteristics::MEM_READ)
                    .bits(),
            ),
        ];

        let mut relocations = None;
        if let Some(bytes) = self.relocations {
            let rva = align_up(RDATA_RVA + bodies[1].2.len() as u32, SECTION_ALIGNMENT);
            relocations = Some(DataDirectory {
                virtual_address: rva,
                size: bytes.len() as u32,
            });
            let mut body = bytes;
            if body.is_empty() {
                body.push(0);
            }
            bodies.push((
                *b".reloc\0\0",
                rva,
                body,
                (SectionCharacteristics::CNT_INITIALIZED_DATA
                    | SectionCharacteristics::MEM_DISCARDABLE
                    | SectionCharacteristics::MEM_READ)
                    .bits(),
            ));
        }

        let mut sections = Vec::new();
        let mut raw = HEADERS_SIZE;
        for (name, rva, body, characteristics) in &bodies {
            let size_of_raw_data = align_up(body.len() as u32, FILE_ALIGNMENT);
            sections.push(SectionHeader {
                name: *name,
                virtual_size: body.len() as u32,
                virtual_address: *rva,
                size_of_raw_data,
                pointer_to_raw_data: raw,
                characteristics: *characteristics,
                ..SectionHeader::default()
            });
            raw += size_of_raw_data;
        }

        let mut data = vec![0u8; raw as usize];
        data[0..2].copy_from_slice(&DOS_MAGIC.to_le_bytes());
        data[0x3C..0x40].copy_from_slice(&(E_LFANEW as u32).to_le_bytes());
        data[E_LFANEW..E_LFANEW + 4].copy_from_slice(&PE_SIGNATURE.to_le_bytes());

        let fixed = if self.pe32_plus { 112 } else { 96 };
        let optional_size = fixed + 16 * DataDirectory::SIZE;
        let mut characteristics = FileCharacteristics::EXECUTABLE_IMAGE;
        if export.is_some() {
            characteristics |= FileCharacteristics::DLL;
        }
        if !self.pe32_plus {
            characteristics |= FileCharacteristics::MACHINE_32BIT;
        }
        let coff = CoffHeader {
            machine: if self.pe32_plus {
                MACHINE_AMD64
            } else {
                MACHINE_I386
            },
            number_of_sections: sections.len() as u16,
            size_of_optional_header: optional_size as u16,
            characteristics: characteristics.bits(),
            ..CoffHeader::default()
        };
        coff.encode(&mut data, E_LFANEW + 4).unwrap();

        let optional = E_LFANEW + 4 + CoffHeader::SIZE;
        let mut put = |at: usize, bytes: &[u8]| {
            data[optional + at..optional + at + bytes.len()].copy_from_slice(bytes);
        };
        if self.pe32_plus {
            put(0, &PE32_PLUS_MAGIC.to_le_bytes());
            put(24, &0x1_4000_0000u64.to_le_bytes());
        } else {
            put(0, &PE32_MAGIC.to_le_bytes());
            put(24, &RDATA_RVA.to_le_bytes());
            put(28, &0x0040_0000u32.to_le_bytes());
        }
        put(16, &TEXT_RVA.to_le_bytes());
        put(20, &TEXT_RVA.to_le_bytes());
        put(32, &SECTION_ALIGNMENT.to_le_bytes());
        put(36, &FILE_ALIGNMENT.to_le_bytes());
        let size_of_image = sections
            .last()
            .map_or(SECTION_ALIGNMENT, |last| {
                align_up(last.virtual_address + last.virtual_size, SECTION_ALIGNMENT)
            });
        put(56, &size_of_image.to_le_bytes());
        put(60, &HEADERS_SIZE.to_le_bytes());
        put(68, &3u16.to_le_bytes());
        put(fixed - 4, &16u32.to_le_bytes());

        let directories = [
            (DataDirectoryType::ExportTable, export),
            (DataDirectoryType::ImportTable, import),
            (DataDirectoryType::BaseRelocationTable, relocations),
        ];
        for (kind, directory) in directories {
            if let Some(directory) = directory {
                let at = fixed + kind as usize * DataDirectory::SIZE;
                put(at, &directory.virtual_address.to_le_bytes());
                put(at + 4, &directory.size.to_le_bytes());
            }
        }

        let table = optional + optional_size;
        for (index, section) in sections.iter().enumerate() {
            section
                .encode(&mut data, table + index * SectionHeader::SIZE)
                .unwrap();
        }
        for (section, (_, _, body, _)) in sections.iter().zip(&bodies) {
            let at = section.pointer_to_raw_data as usize;
            data[at..at + body.len()].copy_from_slice(body);
        }

        let export_offset = export.map(|directory| {
            (directory.virtual_address - RDATA_RVA + sections[1].pointer_to_raw_data) as usize
        });

        Image {
            data,
            sections,
            pe32_plus: self.pe32_plus,
            optional_header_offset: optional,
            export_offset,
            import,
            relocations,
        }
    }
}
