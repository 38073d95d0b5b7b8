//! Container Access
//!
//! Boundary to the serialized-container decoder. A [`ContainerReader`] produces typed field
//! records for the objects of one open container; a [`ContainerHandle`] owns that reader behind
//! the container's exclusive critical section.

pub mod memory;

use crate::error::ContainerError;
use crate::types::{FileIndex, NodeId, RawRef, SELF_FILE};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub use memory::MemoryContainer;

/// Type-name prefix of typed reference fields
pub const REFERENCE_TYPE_PREFIX: &str = "PPtr<";

/// Structural field names
pub const FIELD_GAME_OBJECT: &str = "m_GameObject";
pub const FIELD_CHILDREN: &str = "m_Children";
pub const FIELD_FATHER: &str = "m_Father";
pub const FIELD_NAME: &str = "m_Name";

/// Object kind within a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    pub const GAME_OBJECT: ClassId = ClassId(1);
    pub const TRANSFORM: ClassId = ClassId(4);
    pub const ASSET_BUNDLE: ClassId = ClassId(142);
    pub const RECT_TRANSFORM: ClassId = ClassId(224);

    /// Record kinds carrying parent/child hierarchy links
    pub fn is_transform(self) -> bool {
        self == Self::TRANSFORM || self == Self::RECT_TRANSFORM
    }
}

/// A named, typed field of a serialized record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value,
        }
    }

    /// Typed reference field
    pub fn reference(name: impl Into<String>, target_type: &str, target: RawRef) -> Self {
        Self::new(
            name,
            format!("{}{}>", REFERENCE_TYPE_PREFIX, target_type),
            FieldValue::Ref(target),
        )
    }

    pub fn is_reference(&self) -> bool {
        self.type_name.starts_with(REFERENCE_TYPE_PREFIX)
    }
}

/// Value of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ref(RawRef),
    Array(Vec<Field>),
    Struct(Vec<Field>),
}

impl FieldValue {
    pub fn as_ref_value(&self) -> Option<RawRef> {
        match self {
            FieldValue::Ref(r) => Some(*r),
            _ => None,
        }
    }

    fn members(&self) -> Option<&[Field]> {
        match self {
            FieldValue::Array(fields) | FieldValue::Struct(fields) => Some(fields),
            _ => None,
        }
    }
}

/// One entry of the lazy field sequence produced for an object
#[derive(Debug, Clone)]
pub struct FieldRecord<'a> {
    pub name: Cow<'a, str>,
    pub type_name: Cow<'a, str>,
    pub value: Cow<'a, FieldValue>,
}

impl<'a> FieldRecord<'a> {
    pub fn borrowed(field: &'a Field) -> Self {
        Self {
            name: Cow::Borrowed(&field.name),
            type_name: Cow::Borrowed(&field.type_name),
            value: Cow::Borrowed(&field.value),
        }
    }

    pub fn is_reference(&self) -> bool {
        self.type_name.starts_with(REFERENCE_TYPE_PREFIX)
    }
}

pub type FieldIter<'a> = Box<dyn Iterator<Item = Result<FieldRecord<'a>, ContainerError>> + 'a>;

/// Fully decoded object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: NodeId,
    pub class_id: ClassId,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl ObjectRecord {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    fn require(&self, name: &str) -> Result<&FieldValue, ContainerError> {
        self.field(name).ok_or_else(|| ContainerError::MissingField {
            node: self.id,
            field: name.to_string(),
        })
    }

    pub fn reference(&self, name: &str) -> Result<RawRef, ContainerError> {
        self.require(name)?
            .as_ref_value()
            .ok_or_else(|| ContainerError::UnexpectedType {
                node: self.id,
                field: name.to_string(),
                expected: "reference",
            })
    }

    /// Ordered references of an array field
    pub fn references(&self, name: &str) -> Result<Vec<RawRef>, ContainerError> {
        let unexpected = || ContainerError::UnexpectedType {
            node: self.id,
            field: name.to_string(),
            expected: "reference array",
        };
        match self.require(name)? {
            FieldValue::Array(items) => items
                .iter()
                .map(|item| item.value.as_ref_value().ok_or_else(unexpected))
                .collect(),
            _ => Err(unexpected()),
        }
    }

    pub fn string(&self, name: &str) -> Result<&str, ContainerError> {
        match self.require(name)? {
            FieldValue::Str(s) => Ok(s),
            _ => Err(ContainerError::UnexpectedType {
                node: self.id,
                field: name.to_string(),
                expected: "string",
            }),
        }
    }

    /// Depth-first walk over every field, composites before their members.
    pub fn walk(&self) -> FlattenFields<'_> {
        FlattenFields::new(&self.fields)
    }
}

/// Lazy depth-first flattening of a field tree
pub struct FlattenFields<'a> {
    stack: Vec<std::slice::Iter<'a, Field>>,
}

impl<'a> FlattenFields<'a> {
    pub fn new(fields: &'a [Field]) -> Self {
        Self {
            stack: vec![fields.iter()],
        }
    }
}

impl<'a> Iterator for FlattenFields<'a> {
    type Item = &'a Field;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(field) => {
                    if let Some(members) = field.value.members() {
                        self.stack.push(members.iter());
                    }
                    return Some(field);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Entry of a container's external-file table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalFile {
    /// Origin path name, e.g. `archive:/CAB-1f2e.../CAB-1f2e...`
    pub path: String,
}

/// Decoder for one open container.
///
/// Implementations hold a single cursor over the backing data, hence `&mut self` on every
/// read; callers reach a reader only through [`ContainerHandle::lock`].
pub trait ContainerReader: Send {
    fn name(&self) -> &str;

    fn class_id(&mut self, id: NodeId) -> Result<ClassId, ContainerError>;

    /// Lazy flattened field sequence of an object
    fn fields(&mut self, id: NodeId) -> Result<FieldIter<'_>, ContainerError>;

    fn read_record(&mut self, id: NodeId) -> Result<ObjectRecord, ContainerError>;

    fn object_ids(&self) -> Vec<NodeId>;

    /// Ids of every hierarchy-structural object
    fn transform_ids(&self) -> Vec<NodeId>;

    fn externals(&self) -> &[ExternalFile];
}

/// An open container with its exclusive reader lock
pub struct ContainerHandle {
    name: String,
    externals: Vec<ExternalFile>,
    reader: Mutex<Box<dyn ContainerReader>>,
}

impl ContainerHandle {
    pub fn new(reader: impl ContainerReader + 'static) -> Self {
        Self::from_boxed(Box::new(reader))
    }

    pub fn from_boxed(reader: Box<dyn ContainerReader>) -> Self {
        Self {
            name: reader.name().to_string(),
            externals: reader.externals().to_vec(),
            reader: Mutex::new(reader),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn externals(&self) -> &[ExternalFile] {
        &self.externals
    }

    /// Origin path for a file index (`None` for the container itself or an index out of range)
    pub fn external_file(&self, file_index: FileIndex) -> Option<&ExternalFile> {
        if file_index == SELF_FILE || file_index < 0 {
            return None;
        }
        self.externals.get(file_index as usize - 1)
    }

    /// Enter the container's critical section
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn ContainerReader>> {
        self.reader.lock()
    }
}

impl std::fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("name", &self.name)
            .field("externals", &self.externals.len())
            .finish()
    }
}
