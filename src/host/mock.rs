//! In-memory host for deterministic testing
//!
//! Implements [`HostServices`] and [`ConfigHost`] over plain tables so
//! capture flows can be exercised without a real runtime behind them.
//! Every query bumps a counter, which lets tests confirm that a call
//! actually reached the host rather than being answered from a cache.
//!
//! # Example
//! ```
//! use jitcap::host::mock::{MockClass, MockHost, MockMethod};
//! use jitcap::host::{ClassHandle, HostServices, MethodHandle};
//!
//! let host = MockHost::new()
//!     .with_class(ClassHandle(0x10), MockClass::reference("App.Program"))
//!     .with_method(MethodHandle(0x20), MockMethod::new("Main", ClassHandle(0x10)));
//!
//! assert_eq!(host.get_method_class(MethodHandle(0x20)), Ok(ClassHandle(0x10)));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::config::ConfigHost;
use super::services::{HostError, HostServices};
use super::types::{
    AllocMemRequest, AllocMemResponse, BuiltinClass, ClassAttribs, ClassHandle, CorInfoType,
    FieldHandle, MethodAttribs, MethodHandle, MethodName, ModuleHandle, ResolvedToken,
};

/// First address handed out by `alloc_mem`.
pub const MOCK_CODE_BASE: u64 = 0x1000;

const BUILTINS: [(BuiltinClass, u64, &str, CorInfoType); 7] = [
    (BuiltinClass::Object, 0x100, "System.Object", CorInfoType::Class),
    (BuiltinClass::TypedByRef, 0x101, "System.TypedReference", CorInfoType::RefAny),
    (BuiltinClass::TypeHandle, 0x102, "System.RuntimeTypeHandle", CorInfoType::ValueClass),
    (BuiltinClass::FieldHandle, 0x103, "System.RuntimeFieldHandle", CorInfoType::ValueClass),
    (BuiltinClass::MethodHandle, 0x104, "System.RuntimeMethodHandle", CorInfoType::ValueClass),
    (BuiltinClass::String, 0x105, "System.String", CorInfoType::String),
    (BuiltinClass::RuntimeType, 0x106, "System.RuntimeType", CorInfoType::Class),
];

/// A class known to the mock host.
#[derive(Debug, Clone)]
pub struct MockClass {
    pub name: String,
    pub attribs: ClassAttribs,
    pub is_value: bool,
    pub cor_type: CorInfoType,
    pub size: u32,
}

impl MockClass {
    /// A reference type of pointer size.
    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribs: ClassAttribs::default(),
            is_value: false,
            cor_type: CorInfoType::Class,
            size: 8,
        }
    }

    /// A value type of the given size.
    pub fn value(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            attribs: ClassAttribs(ClassAttribs::VALUE_CLASS | ClassAttribs::SEALED),
            is_value: true,
            cor_type: CorInfoType::ValueClass,
            size,
        }
    }

    pub fn with_attribs(mut self, attribs: ClassAttribs) -> Self {
        self.attribs = attribs;
        self
    }
}

/// A method known to the mock host.
#[derive(Debug, Clone)]
pub struct MockMethod {
    pub name: String,
    pub class: ClassHandle,
    pub attribs: MethodAttribs,
}

impl MockMethod {
    pub fn new(name: impl Into<String>, class: ClassHandle) -> Self {
        Self {
            name: name.into(),
            class,
            attribs: MethodAttribs::default(),
        }
    }
}

#[derive(Debug, Default)]
struct MockMemory {
    next_address: u64,
    regions: BTreeMap<u64, Vec<u8>>,
    next_gc_info: u64,
}

impl MockMemory {
    fn reserve(&mut self, size: u32, alignment: u32) -> u64 {
        let align = u64::from(alignment.max(1));
        let address = self.next_address.div_ceil(align) * align;
        self.next_address = address + u64::from(size.max(1));
        self.regions.insert(address, vec![0; size as usize]);
        address
    }

    fn region_mut(&mut self, address: u64, len: usize) -> Option<(&mut Vec<u8>, usize)> {
        let (&start, region) = self.regions.range_mut(..=address).next_back()?;
        let offset = (address - start) as usize;
        (offset + len <= region.len()).then_some((region, offset))
    }
}

#[derive(Debug, Default)]
struct MockTables {
    builtins: HashMap<BuiltinClass, ClassHandle>,
    classes: HashMap<ClassHandle, MockClass>,
    methods: HashMap<MethodHandle, MockMethod>,
    tokens: HashMap<(ModuleHandle, u32), ResolvedToken>,
    fields: HashMap<FieldHandle, u32>,
    config: HashMap<String, String>,
}

/// Mock host services for testing
pub struct MockHost {
    tables: Mutex<MockTables>,
    memory: Mutex<MockMemory>,
    /// Query name that panics instead of answering
    panic_on: Option<&'static str>,
    /// Number of queries answered (or attempted)
    queries: AtomicUsize,
}

impl MockHost {
    /// Create a host that knows the well-known builtin classes and nothing else.
    pub fn new() -> Self {
        let mut tables = MockTables::default();
        for (id, handle, name, cor_type) in BUILTINS {
            let handle = ClassHandle(handle);
            tables.builtins.insert(id, handle);
            let mut class = MockClass::reference(name);
            class.cor_type = cor_type;
            if cor_type == CorInfoType::ValueClass {
                class = MockClass::value(name, 8);
            }
            tables.classes.insert(handle, class);
        }
        Self {
            tables: Mutex::new(tables),
            memory: Mutex::new(MockMemory {
                next_address: MOCK_CODE_BASE,
                next_gc_info: 0x9000,
                ..MockMemory::default()
            }),
            panic_on: None,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn with_class(self, handle: ClassHandle, class: MockClass) -> Self {
        self.tables.lock().classes.insert(handle, class);
        self
    }

    pub fn with_method(self, handle: MethodHandle, method: MockMethod) -> Self {
        self.tables.lock().methods.insert(handle, method);
        self
    }

    pub fn with_token(self, module: ModuleHandle, resolved: ResolvedToken) -> Self {
        self.tables
            .lock()
            .tokens
            .insert((module, resolved.token), resolved);
        self
    }

    pub fn with_field(self, handle: FieldHandle, offset: u32) -> Self {
        self.tables.lock().fields.insert(handle, offset);
        self
    }

    pub fn with_config(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tables.lock().config.insert(name.into(), value.into());
        self
    }

    /// Make the named query panic, simulating a host bug.
    pub fn panicking_on(mut self, query: &'static str) -> Self {
        self.panic_on = Some(query);
        self
    }

    /// Change a class's attributes, as a runtime does when a type finishes loading.
    pub fn set_class_attribs(&self, class: ClassHandle, attribs: ClassAttribs) {
        if let Some(entry) = self.tables.lock().classes.get_mut(&class) {
            entry.attribs = attribs;
        }
    }

    /// Number of queries that reached this host.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn enter(&self, query: &'static str) {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.panic_on == Some(query) {
            panic!("mock host panicked in {query}");
        }
    }

    fn class<T>(
        &self,
        class: ClassHandle,
        read: impl FnOnce(&MockClass) -> T,
    ) -> Result<T, HostError> {
        self.tables
            .lock()
            .classes
            .get(&class)
            .map(read)
            .ok_or(HostError::InvalidHandle(class.0))
    }

    fn method<T>(
        &self,
        method: MethodHandle,
        read: impl FnOnce(&MockMethod, &MockTables) -> T,
    ) -> Result<T, HostError> {
        let tables = self.tables.lock();
        tables
            .methods
            .get(&method)
            .map(|m| read(m, &tables))
            .ok_or(HostError::InvalidHandle(method.0))
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostServices for MockHost {
    fn get_builtin_class(&self, id: BuiltinClass) -> Option<ClassHandle> {
        self.enter("get_builtin_class");
        self.tables.lock().builtins.get(&id).copied()
    }

    fn get_method_class(&self, method: MethodHandle) -> Result<ClassHandle, HostError> {
        self.enter("get_method_class");
        self.method(method, |m, _| m.class)
    }

    fn get_method_name(&self, method: MethodHandle) -> Result<MethodName, HostError> {
        self.enter("get_method_name");
        self.method(method, |m, tables| MethodName {
            name: m.name.clone(),
            class_name: tables.classes.get(&m.class).map(|c| c.name.clone()),
        })
    }

    fn get_method_attribs(&self, method: MethodHandle) -> Result<MethodAttribs, HostError> {
        self.enter("get_method_attribs");
        self.method(method, |m, _| m.attribs)
    }

    fn get_class_attribs(&self, class: ClassHandle) -> Result<ClassAttribs, HostError> {
        self.enter("get_class_attribs");
        self.class(class, |c| c.attribs)
    }

    fn get_class_name(&self, class: ClassHandle) -> Result<String, HostError> {
        self.enter("get_class_name");
        self.class(class, |c| c.name.clone())
    }

    fn is_value_class(&self, class: ClassHandle) -> Result<bool, HostError> {
        self.enter("is_value_class");
        self.class(class, |c| c.is_value)
    }

    fn as_cor_info_type(&self, class: ClassHandle) -> Result<CorInfoType, HostError> {
        self.enter("as_cor_info_type");
        self.class(class, |c| c.cor_type)
    }

    fn get_class_size(&self, class: ClassHandle) -> Result<u32, HostError> {
        self.enter("get_class_size");
        self.class(class, |c| c.size)
    }

    fn resolve_token(&self, module: ModuleHandle, token: u32) -> Result<ResolvedToken, HostError> {
        self.enter("resolve_token");
        self.tables
            .lock()
            .tokens
            .get(&(module, token))
            .copied()
            .ok_or_else(|| HostError::NotFound(format!("token {token:#x} in module {module}")))
    }

    fn get_field_offset(&self, field: FieldHandle) -> Result<u32, HostError> {
        self.enter("get_field_offset");
        self.tables
            .lock()
            .fields
            .get(&field)
            .copied()
            .ok_or(HostError::InvalidHandle(field.0))
    }

    fn alloc_mem(&self, request: AllocMemRequest) -> Result<AllocMemResponse, HostError> {
        self.enter("alloc_mem");
        if request.hot_code_size == 0 {
            return Err(HostError::Unsupported("empty hot code region".into()));
        }
        let mut memory = self.memory.lock();
        let hot_code = memory.reserve(request.hot_code_size, request.alignment);
        let cold_code = (request.cold_code_size > 0)
            .then(|| memory.reserve(request.cold_code_size, request.alignment));
        let ro_data =
            (request.ro_data_size > 0).then(|| memory.reserve(request.ro_data_size, 8));
        Ok(AllocMemResponse {
            hot_code,
            cold_code,
            ro_data,
        })
    }

    fn alloc_gc_info(&self, size: u32) -> Result<u64, HostError> {
        self.enter("alloc_gc_info");
        let mut memory = self.memory.lock();
        let address = memory.next_gc_info;
        memory.next_gc_info += u64::from(size.max(1));
        Ok(address)
    }

    fn write_code(&self, address: u64, bytes: &[u8]) -> Result<(), HostError> {
        self.enter("write_code");
        let mut memory = self.memory.lock();
        let (region, offset) = memory
            .region_mut(address, bytes.len())
            .ok_or(HostError::InvalidHandle(address))?;
        region[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn read_code(&self, address: u64, len: u32) -> Option<Vec<u8>> {
        let mut memory = self.memory.lock();
        let (region, offset) = memory.region_mut(address, len as usize)?;
        Some(region[offset..offset + len as usize].to_vec())
    }
}

impl ConfigHost for MockHost {
    fn get_int_config(&self, name: &str, default: i32) -> i32 {
        self.enter("get_int_config");
        self.tables
            .lock()
            .config
            .get(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_string_config(&self, name: &str) -> Option<String> {
        self.enter("get_string_config");
        self.tables.lock().config.get(name).cloned()
    }
}
