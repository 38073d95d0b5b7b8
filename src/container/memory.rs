//! In-memory container, also used as the JSON dump format read by the CLI.

use super::{
    ClassId, ContainerReader, ExternalFile, Field, FieldIter, FieldRecord, FieldValue,
    ObjectRecord, FIELD_CHILDREN, FIELD_FATHER, FIELD_GAME_OBJECT, FIELD_NAME,
};
use crate::error::ContainerError;
use crate::types::{NodeId, RawRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Serialized form: objects as a list so ids stay numeric in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContainerDump {
    name: String,
    #[serde(default)]
    externals: Vec<ExternalFile>,
    #[serde(default)]
    objects: Vec<ObjectRecord>,
}

/// Container held entirely in memory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ContainerDump", into = "ContainerDump")]
pub struct MemoryContainer {
    name: String,
    externals: Vec<ExternalFile>,
    objects: BTreeMap<NodeId, ObjectRecord>,
}

impl TryFrom<ContainerDump> for MemoryContainer {
    type Error = ContainerError;

    fn try_from(dump: ContainerDump) -> Result<Self, Self::Error> {
        let mut objects = BTreeMap::new();
        for record in dump.objects {
            let id = record.id;
            if id == 0 {
                return Err(ContainerError::Corrupt(
                    "object id 0 is reserved for null references".to_string(),
                ));
            }
            if objects.insert(id, record).is_some() {
                return Err(ContainerError::Corrupt(format!("duplicate object id {}", id)));
            }
        }
        Ok(Self {
            name: dump.name,
            externals: dump.externals,
            objects,
        })
    }
}

impl From<MemoryContainer> for ContainerDump {
    fn from(container: MemoryContainer) -> Self {
        Self {
            name: container.name,
            externals: container.externals,
            objects: container.objects.into_values().collect(),
        }
    }
}

impl MemoryContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            externals: Vec::new(),
            objects: BTreeMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ContainerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ContainerError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> Result<String, ContainerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Append an external-file entry; returns its file index.
    pub fn add_external(&mut self, origin_path: impl Into<String>) -> i32 {
        self.externals.push(ExternalFile {
            path: origin_path.into(),
        });
        self.externals.len() as i32
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn insert_object(&mut self, record: ObjectRecord) -> &mut Self {
        self.objects.insert(record.id, record);
        self
    }

    pub fn insert_game_object(&mut self, id: NodeId, name: &str, components: &[NodeId]) -> &mut Self {
        let components = components
            .iter()
            .map(|&c| {
                Field::new(
                    "data",
                    "ComponentPair",
                    FieldValue::Struct(vec![Field::reference(
                        "component",
                        "Component",
                        RawRef::internal(c),
                    )]),
                )
            })
            .collect();
        self.insert_object(ObjectRecord {
            id,
            class_id: ClassId::GAME_OBJECT,
            fields: vec![
                Field::new("m_Component", "vector", FieldValue::Array(components)),
                Field::new("m_Layer", "unsigned int", FieldValue::Int(0)),
                Field::new(FIELD_NAME, "string", FieldValue::Str(name.to_string())),
            ],
        })
    }

    /// Transform with internal links; `parent` 0 means a root.
    pub fn insert_transform(
        &mut self,
        id: NodeId,
        game_object: NodeId,
        parent: NodeId,
        children: &[NodeId],
    ) -> &mut Self {
        let children = children
            .iter()
            .map(|&c| Field::reference("data", "Transform", RawRef::internal(c)))
            .collect();
        self.insert_object(ObjectRecord {
            id,
            class_id: ClassId::TRANSFORM,
            fields: vec![
                Field::reference(FIELD_GAME_OBJECT, "GameObject", RawRef::internal(game_object)),
                Field::new(
                    "m_LocalPosition",
                    "Vector3f",
                    FieldValue::Struct(vec![
                        Field::new("x", "float", FieldValue::Float(0.0)),
                        Field::new("y", "float", FieldValue::Float(0.0)),
                        Field::new("z", "float", FieldValue::Float(0.0)),
                    ]),
                ),
                Field::new(FIELD_CHILDREN, "vector", FieldValue::Array(children)),
                Field::reference(FIELD_FATHER, "Transform", RawRef::internal(parent)),
            ],
        })
    }

    /// Component attached to a game object, with extra fields appended.
    pub fn insert_component(
        &mut self,
        id: NodeId,
        class_id: ClassId,
        game_object: NodeId,
        extra: Vec<Field>,
    ) -> &mut Self {
        let mut fields = vec![Field::reference(
            FIELD_GAME_OBJECT,
            "GameObject",
            RawRef::internal(game_object),
        )];
        fields.extend(extra);
        self.insert_object(ObjectRecord {
            id,
            class_id,
            fields,
        })
    }

    fn get(&self, id: NodeId) -> Result<&ObjectRecord, ContainerError> {
        self.objects.get(&id).ok_or(ContainerError::NodeNotFound(id))
    }
}

impl ContainerReader for MemoryContainer {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_id(&mut self, id: NodeId) -> Result<ClassId, ContainerError> {
        Ok(self.get(id)?.class_id)
    }

    fn fields(&mut self, id: NodeId) -> Result<FieldIter<'_>, ContainerError> {
        let record = self.get(id)?;
        Ok(Box::new(record.walk().map(|f| Ok(FieldRecord::borrowed(f)))))
    }

    fn read_record(&mut self, id: NodeId) -> Result<ObjectRecord, ContainerError> {
        self.get(id).cloned()
    }

    fn object_ids(&self) -> Vec<NodeId> {
        self.objects.keys().copied().collect()
    }

    fn transform_ids(&self) -> Vec<NodeId> {
        self.objects
            .values()
            .filter(|r| r.class_id.is_transform())
            .map(|r| r.id)
            .collect()
    }

    fn externals(&self) -> &[ExternalFile] {
        &self.externals
    }
}
