use serde::{Deserialize, Serialize};

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

handle_type!(
    /// Opaque host handle for a type.
    ClassHandle
);
handle_type!(
    /// Opaque host handle for a method.
    MethodHandle
);
handle_type!(
    /// Opaque host handle for the module a token is resolved against.
    ModuleHandle
);
handle_type!(
    /// Opaque host handle for a field.
    FieldHandle
);

/// Well-known classes the host can always answer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinClass {
    Object,
    TypedByRef,
    TypeHandle,
    FieldHandle,
    MethodHandle,
    String,
    RuntimeType,
}

impl BuiltinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinClass::Object => "object",
            BuiltinClass::TypedByRef => "typed_by_ref",
            BuiltinClass::TypeHandle => "type_handle",
            BuiltinClass::FieldHandle => "field_handle",
            BuiltinClass::MethodHandle => "method_handle",
            BuiltinClass::String => "string",
            BuiltinClass::RuntimeType => "runtime_type",
        }
    }
}

/// Primitive classification the engine uses for a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorInfoType {
    Undef,
    Void,
    Bool,
    Char,
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    NativeInt,
    NativeUInt,
    Float,
    Double,
    String,
    Ptr,
    ByRef,
    ValueClass,
    Class,
    RefAny,
}

/// Attribute bits of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassAttribs(pub u32);

impl ClassAttribs {
    pub const VALUE_CLASS: u32 = 0x0000_0001;
    pub const SEALED: u32 = 0x0000_0002;
    pub const ABSTRACT: u32 = 0x0000_0004;
    pub const INTERFACE: u32 = 0x0000_0008;
    pub const CONTAINS_GC_PTR: u32 = 0x0000_0010;
    pub const BEFOREFIELDINIT: u32 = 0x0000_0020;

    pub fn contains(self, bits: u32) -> bool {
        self.0 & bits == bits
    }
}

/// Attribute bits of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodAttribs(pub u32);

impl MethodAttribs {
    pub const STATIC: u32 = 0x0000_0001;
    pub const FINAL: u32 = 0x0000_0002;
    pub const VIRTUAL: u32 = 0x0000_0004;
    pub const NOINLINE: u32 = 0x0000_0008;
    pub const SYNCHRONIZED: u32 = 0x0000_0010;

    pub fn contains(self, bits: u32) -> bool {
        self.0 & bits == bits
    }
}

/// Name of a method, with the name of its declaring class when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodName {
    pub name: String,
    pub class_name: Option<String>,
}

/// Result of resolving a metadata token in a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedToken {
    pub token: u32,
    pub class: ClassHandle,
    pub method: Option<MethodHandle>,
    pub field: Option<FieldHandle>,
}

/// Sizes the engine asks the host to reserve for generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocMemRequest {
    pub hot_code_size: u32,
    pub cold_code_size: u32,
    pub ro_data_size: u32,
    pub alignment: u32,
}

/// Addresses the host reserved in answer to an [`AllocMemRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocMemResponse {
    pub hot_code: u64,
    pub cold_code: Option<u64>,
    pub ro_data: Option<u64>,
}
