//! Host-services surface the engine calls back into.

pub mod config;
pub mod mock;
pub mod services;
pub mod types;

pub use config::ConfigHost;
pub use services::{HostError, HostServices};
pub use types::{
    AllocMemRequest, AllocMemResponse, BuiltinClass, ClassAttribs, ClassHandle, CorInfoType,
    FieldHandle, MethodAttribs, MethodHandle, MethodName, ModuleHandle, ResolvedToken,
};
