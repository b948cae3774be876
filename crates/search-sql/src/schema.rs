//! Names from the normalized relational schema.
//!
//! Every resource type `T` owns `T_LOGICAL_RESOURCES` (one row per logical
//! resource, pointing at its current version), `T_RESOURCES` (one row per
//! version) and one table per indexed value kind, such as `T_STR_VALUES`.

use crate::types::SearchParamType;

/// Column holding the logical-resource surrogate id.
pub const LOGICAL_RESOURCE_ID: &str = "LOGICAL_RESOURCE_ID";
/// Column holding the parameter-name surrogate id.
pub const PARAMETER_NAME_ID: &str = "PARAMETER_NAME_ID";
/// Literal for a row that is not deleted.
pub const NOT_DELETED: &str = "'N'";

/// Columns selected for resource payload rows.
pub const RESOURCE_COLUMNS: [&str; 6] = [
    "RESOURCE_ID",
    "LOGICAL_RESOURCE_ID",
    "VERSION_ID",
    "LAST_UPDATED",
    "IS_DELETED",
    "DATA",
];

/// Per-resource-type value tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTable {
    /// `_STR_VALUES` (strings and URIs)
    Strings,
    /// `_NUMBER_VALUES`
    Numbers,
    /// `_DATE_VALUES`
    Dates,
    /// `_QUANTITY_VALUES`
    Quantities,
    /// `_TOKEN_VALUES_V`, the view joining token references to their values
    TokenValues,
    /// `_RESOURCE_TOKEN_REFS`, token references by common token value id only
    TokenRefs,
    /// `_LATLNG_VALUES`
    LatLng,
    /// `_PROFILES`
    Profiles,
    /// `_TAGS`
    Tags,
    /// `_SECURITY`
    Security,
}

impl ValueTable {
    /// Table name suffix.
    pub fn suffix(&self) -> &'static str {
        match self {
            ValueTable::Strings => "_STR_VALUES",
            ValueTable::Numbers => "_NUMBER_VALUES",
            ValueTable::Dates => "_DATE_VALUES",
            ValueTable::Quantities => "_QUANTITY_VALUES",
            ValueTable::TokenValues => "_TOKEN_VALUES_V",
            ValueTable::TokenRefs => "_RESOURCE_TOKEN_REFS",
            ValueTable::LatLng => "_LATLNG_VALUES",
            ValueTable::Profiles => "_PROFILES",
            ValueTable::Tags => "_TAGS",
            ValueTable::Security => "_SECURITY",
        }
    }

    /// The table that stores values of a parameter type, if any.
    pub fn for_type(param_type: SearchParamType) -> Option<Self> {
        match param_type {
            SearchParamType::String | SearchParamType::Uri => Some(ValueTable::Strings),
            SearchParamType::Number => Some(ValueTable::Numbers),
            SearchParamType::Date => Some(ValueTable::Dates),
            SearchParamType::Quantity => Some(ValueTable::Quantities),
            SearchParamType::Token | SearchParamType::Reference => Some(ValueTable::TokenValues),
            SearchParamType::Special => Some(ValueTable::LatLng),
            SearchParamType::Composite => None,
        }
    }

    /// Returns true if rows are keyed by `PARAMETER_NAME_ID`.
    ///
    /// Tags, security labels and profiles have dedicated tables.
    pub fn has_parameter_name(&self) -> bool {
        !matches!(
            self,
            ValueTable::Profiles | ValueTable::Tags | ValueTable::Security
        )
    }

    /// Qualified table name for a resource type.
    pub fn table(&self, resource_type: &str) -> String {
        format!("{}{}", resource_type, self.suffix())
    }
}

/// `T_LOGICAL_RESOURCES`
pub fn logical_resources(resource_type: &str) -> String {
    format!("{}_LOGICAL_RESOURCES", resource_type)
}

/// `T_RESOURCES`
pub fn resources(resource_type: &str) -> String {
    format!("{}_RESOURCES", resource_type)
}

/// Join condition tying a value-table alias to a logical-resource alias.
pub fn correlate(value_alias: &str, lr_alias: &str) -> String {
    format!(
        "{v}.{c} = {lr}.{c}",
        v = value_alias,
        lr = lr_alias,
        c = LOGICAL_RESOURCE_ID
    )
}
