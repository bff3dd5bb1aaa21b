//! Canonical property names of stored genealogy notes.

pub const NAME: &str = "name";
pub const GIVEN_NAME: &str = "given_name";
pub const SURNAME: &str = "surname";
pub const SEX: &str = "sex";
pub const BIRTH_DATE: &str = "birth_date";
pub const BIRTH_PLACE: &str = "birth_place";
pub const BIRTH_PLACE_ID: &str = "birth_place_id";
pub const DEATH_DATE: &str = "death_date";
pub const DEATH_PLACE: &str = "death_place";
pub const DEATH_PLACE_ID: &str = "death_place_id";
pub const OCCUPATION: &str = "occupation";
pub const COLLECTION: &str = "collection";
pub const RESEARCH_LEVEL: &str = "research_level";
pub const LIVING: &str = "living";
/// Identifier the record had in the imported document.
pub const EXTERNAL_ID: &str = "external_id";
/// Originating identifier carried by `_CRID`.
pub const ORIGIN_ID: &str = "origin_id";

pub const EVENT_TYPE: &str = "event_type";
pub const EVENT_TAG: &str = "tag";
pub const DATE: &str = "date";
pub const PLACE: &str = "place";
pub const PLACE_ID: &str = "place_id";
pub const DESCRIPTION: &str = "description";
pub const SOURCE_ID: &str = "source_id";

pub const TITLE: &str = "title";
pub const AUTHOR: &str = "author";
pub const PUBLISHER: &str = "publisher";
pub const REPOSITORY: &str = "repository";

/// Relationship stored as an id property plus a display link property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationField {
    /// Holds target record ids.
    pub id: &'static str,
    /// Holds `[[basename]]` links to the target notes.
    pub link: &'static str,
    pub multi: bool,
}

pub const FATHER: RelationField = RelationField {
    id: "father_id",
    link: "father",
    multi: false,
};
pub const MOTHER: RelationField = RelationField {
    id: "mother_id",
    link: "mother",
    multi: false,
};
pub const SPOUSES: RelationField = RelationField {
    id: "spouse_id",
    link: "spouse",
    multi: true,
};
pub const CHILDREN: RelationField = RelationField {
    id: "children_id",
    link: "children",
    multi: true,
};
pub const STEP_PARENTS: RelationField = RelationField {
    id: "step_parent_id",
    link: "step_parent",
    multi: true,
};
pub const ADOPTIVE_PARENTS: RelationField = RelationField {
    id: "adoptive_parent_id",
    link: "adoptive_parent",
    multi: true,
};
pub const FOSTER_PARENTS: RelationField = RelationField {
    id: "foster_parent_id",
    link: "foster_parent",
    multi: true,
};
/// Event participants.
pub const PERSONS: RelationField = RelationField {
    id: "person_id",
    link: "person",
    multi: true,
};

/// Sources cited by an event.
pub const SOURCES: RelationField = RelationField {
    id: SOURCE_ID,
    link: "source",
    multi: true,
};

pub const PERSON_RELATIONS: [RelationField; 7] = [
    FATHER,
    MOTHER,
    SPOUSES,
    CHILDREN,
    STEP_PARENTS,
    ADOPTIVE_PARENTS,
    FOSTER_PARENTS,
];

/// Wraps a note basename as a link.
pub fn wikilink(target: &str) -> String {
    format!("[[{target}]]")
}
