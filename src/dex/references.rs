//! Constant-pool symbols carried by reference-consuming instructions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dex::opcode_format::ReferenceType;

/// A symbolic reference to a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// The class descriptor, e.g. "Lcom/example/MyClass;".
    pub class: String,
    pub name: String,
    /// The method descriptor, e.g. "(I)V".
    pub descriptor: String,
}

impl MethodRef {
    pub fn new(class: &str, name: &str, descriptor: &str) -> MethodRef {
        MethodRef { class: class.to_string(), name: name.to_string(), descriptor: descriptor.to_string() }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Lkotlin/jvm/internal/Intrinsics;->checkNotNull(Ljava/lang/Object;)V
        write!(f, "{}->{}{}", self.class, self.name, self.descriptor)
    }
}

/// A symbolic reference to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub class: String,
    pub name: String,
    /// The field type descriptor, e.g. "I".
    pub descriptor: String,
}

impl FieldRef {
    pub fn new(class: &str, name: &str, descriptor: &str) -> FieldRef {
        FieldRef { class: class.to_string(), name: name.to_string(), descriptor: descriptor.to_string() }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}", self.class, self.name, self.descriptor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reference {
    String(String),
    /// A type descriptor such as "[I" or "Ljava/lang/Object;".
    Type(String),
    Field(FieldRef),
    Method(MethodRef),
    /// A method prototype descriptor such as "(II)J".
    Proto(String),
    CallSite(String),
    MethodHandle(String),
}

impl Reference {
    pub fn reference_type(&self) -> ReferenceType {
        match self {
            Reference::String(_) => ReferenceType::String,
            Reference::Type(_) => ReferenceType::Type,
            Reference::Field(_) => ReferenceType::Field,
            Reference::Method(_) => ReferenceType::Method,
            Reference::Proto(_) => ReferenceType::MethodProto,
            Reference::CallSite(_) => ReferenceType::CallSite,
            Reference::MethodHandle(_) => ReferenceType::MethodHandle,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::String(s) => write!(f, "{:?}", s),
            Reference::Type(t) | Reference::Proto(t) => write!(f, "{}", t),
            Reference::Field(field) => write!(f, "{}", field),
            Reference::Method(method) => write!(f, "{}", method),
            Reference::CallSite(c) | Reference::MethodHandle(c) => write!(f, "{}", c),
        }
    }
}
