//! Entity schema registry: fields, constrained choices, and relationships,
//! registered once at process start. No runtime schema mutation.

use crate::error::SchemaError;
use serde::Serialize;
use std::collections::HashSet;

/// One allowed value of a constrained field: stored code plus display label.
#[derive(Clone, Debug, Serialize)]
pub struct Choice {
    pub code: &'static str,
    pub label: &'static str,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Store-assigned integer id.
    PrimaryKey,
    Text {
        max_length: usize,
    },
    /// Value must be one of the registered choice codes.
    Choice {
        choices: Vec<Choice>,
    },
    /// Foreign key to another registered entity.
    Reference {
        target: &'static str,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct FieldDef {
    /// Wire name, as it appears in request and response bodies.
    pub name: &'static str,
    /// Stored column name. Differs from `name` for references (`cohort` -> `cohort_id`).
    pub column: &'static str,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct EntityDef {
    pub name: &'static str,
    pub path_segment: &'static str,
    pub table: &'static str,
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    pub fn pk_column(&self) -> &'static str {
        self.fields
            .iter()
            .find(|f| matches!(f.kind, FieldKind::PrimaryKey))
            .map(|f| f.column)
            .unwrap_or("id")
    }

    pub fn field(&self, wire_name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == wire_name)
    }
}

/// Fixed entity registration table, validated at construction.
#[derive(Clone, Debug)]
pub struct Registry {
    entities: Vec<EntityDef>,
}

impl Registry {
    pub fn new(entities: Vec<EntityDef>) -> Result<Self, SchemaError> {
        let mut names = HashSet::new();
        let mut segments = HashSet::new();
        for e in &entities {
            if !names.insert(e.name) {
                return Err(SchemaError::DuplicateEntity(e.name.to_string()));
            }
            if !segments.insert(e.path_segment) {
                return Err(SchemaError::DuplicatePathSegment(e.path_segment.to_string()));
            }
            if !e.fields.iter().any(|f| matches!(f.kind, FieldKind::PrimaryKey)) {
                return Err(SchemaError::MissingPrimaryKey(e.name.to_string()));
            }
        }
        for e in &entities {
            for f in &e.fields {
                if let FieldKind::Reference { target } = &f.kind {
                    if !names.contains(target) {
                        return Err(SchemaError::MissingReferenceTarget {
                            field: format!("{}.{}", e.name, f.name),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(Registry { entities })
    }

    /// The cohort/student roster schema.
    pub fn standard() -> Result<Self, SchemaError> {
        Self::new(vec![
            EntityDef {
                name: "cohort",
                path_segment: "cohort",
                table: "cohort",
                fields: vec![
                    FieldDef {
                        name: "id",
                        column: "id",
                        kind: FieldKind::PrimaryKey,
                        required: false,
                    },
                    FieldDef {
                        name: "name",
                        column: "name",
                        kind: FieldKind::Text { max_length: 100 },
                        required: true,
                    },
                    FieldDef {
                        name: "subject",
                        column: "subject",
                        kind: FieldKind::Choice {
                            choices: subject_choices(),
                        },
                        required: true,
                    },
                ],
            },
            EntityDef {
                name: "student",
                path_segment: "student",
                table: "student",
                fields: vec![
                    FieldDef {
                        name: "id",
                        column: "id",
                        kind: FieldKind::PrimaryKey,
                        required: false,
                    },
                    FieldDef {
                        name: "name",
                        column: "name",
                        kind: FieldKind::Text { max_length: 100 },
                        required: true,
                    },
                    FieldDef {
                        name: "cohort",
                        column: "cohort_id",
                        kind: FieldKind::Reference { target: "cohort" },
                        required: true,
                    },
                ],
            },
        ])
    }

    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn entity_by_path(&self, segment: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.path_segment == segment)
    }

    /// All (entity, reference field) pairs whose reference points at `target`.
    /// Drives cascade delete and requested child embedding.
    pub fn referencing_fields(&self, target: &str) -> Vec<(&EntityDef, &FieldDef)> {
        let mut out = Vec::new();
        for e in &self.entities {
            for f in &e.fields {
                if let FieldKind::Reference { target: t } = &f.kind {
                    if *t == target {
                        out.push((e, f));
                    }
                }
            }
        }
        out
    }
}

fn subject_choices() -> Vec<Choice> {
    vec![
        Choice {
            code: "SEI",
            label: "Software Engineering Immersive",
        },
        Choice {
            code: "UXDI",
            label: "User Experience Design Immersive",
        },
        Choice {
            code: "DSI",
            label: "Data Science Immersive",
        },
    ]
}
