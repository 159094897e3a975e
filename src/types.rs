//! Endpoint definitions for the practice-management API

/// Which fields to request from an endpoint via `_fields`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    All,
    Only(&'static [&'static str]),
}

impl FieldSelection {
    pub fn as_query(&self) -> String {
        match self {
            FieldSelection::All => "_ALL".to_string(),
            FieldSelection::Only(fields) => fields.join(","),
        }
    }
}

/// A collection endpoint and where its data lands on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Path appended to the API base, e.g. "companies/profiles/values"
    pub path: &'static str,
    /// Human label, used for directory, file and table names
    pub label: &'static str,
    pub fields: FieldSelection,
    /// Records live under `response.<key>` instead of `response`
    pub records_key: Option<&'static str>,
    /// Set for attribute/value endpoints that get pivoted after merge.
    /// An empty allow-list keeps every attribute.
    pub profile_attributes: Option<&'static [&'static str]>,
}

impl Endpoint {
    pub const fn new(path: &'static str, label: &'static str) -> Self {
        Self {
            path,
            label,
            fields: FieldSelection::All,
            records_key: None,
            profile_attributes: None,
        }
    }

    pub fn url(&self, api_base: &str) -> String {
        format!("{}{}", api_base, self.path)
    }

    /// Lowercased label, the stem for page files and table names
    pub fn slug(&self) -> String {
        self.label.to_lowercase()
    }

    pub fn page_file_name(&self, page: u64) -> String {
        format!("{}_data_page_{}.csv", self.slug(), page + 1)
    }

    /// Whether `name` is one of this endpoint's page files
    pub fn is_page_file_name(&self, name: &str) -> bool {
        let prefix = format!("{}_data_page_", self.slug());
        name.strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".csv"))
            .is_some_and(|number| number.parse::<u64>().is_ok())
    }

    pub fn merged_file_name(&self) -> String {
        format!("{}_merged.csv", self.label)
    }

    pub fn table_name(&self) -> String {
        format!("{}_data", self.slug())
    }
}

const ACTIVITY_FIELDS: &[&str] = &[
    "subject",
    "thread_id",
    "contract_period_id",
    "parent",
    "nonbillable",
    "against_id",
    "rate_charged",
    "date_started",
    "date_logged",
    "rate",
    "visibility",
    "invoice_id",
    "class",
    "time_allocation",
    "standing",
    "owner",
    "activity_class",
    "against",
    "date_modified",
    "medium",
    "id",
    "activity_priority",
    "date_created",
    "parent_id",
    "staff",
    "owner_id",
    "owner_type",
    "thread",
    "billable",
    "priority",
];

pub const COMPANY_PROFILE_ATTRIBUTES: &[&str] = &["Partner", "Office_Responsible", "Department"];

/// The endpoints synced by default, in extraction order
pub fn default_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::new("staff", "Staff"),
        Endpoint::new("rates", "Rates"),
        Endpoint::new("jobs", "Jobs"),
        Endpoint::new("invoices", "Invoices"),
        Endpoint::new("companies", "Companies"),
        Endpoint::new("issues", "Issues"),
        Endpoint::new("affiliations", "Affiliations"),
        Endpoint::new("milestones", "Milestones"),
        Endpoint::new("contracts", "Contracts"),
        Endpoint {
            profile_attributes: Some(COMPANY_PROFILE_ATTRIBUTES),
            ..Endpoint::new("companies/profiles/values", "Company Profiles")
        },
        Endpoint::new("issues/profiles/values", "Issues Profiles"),
        Endpoint::new("jobs/profiles/values", "Jobs Profiles"),
        Endpoint {
            records_key: Some("expenses"),
            ..Endpoint::new("expenses", "Expenses")
        },
        Endpoint::new("contracts/profiles/values", "Contracts Profiles"),
        Endpoint::new("contracts/periods", "Contract Periods"),
        Endpoint {
            fields: FieldSelection::Only(ACTIVITY_FIELDS),
            ..Endpoint::new("activities", "Activities")
        },
        Endpoint::new("tasks", "Tasks"),
        Endpoint::new("groups", "Groups"),
        Endpoint::new("staff/memberships", "Memberships"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_names() {
        let endpoint = Endpoint::new("companies/profiles/values", "Company Profiles");
        assert_eq!(
            endpoint.url("https://api.example.com/v1/"),
            "https://api.example.com/v1/companies/profiles/values"
        );
        assert_eq!(endpoint.page_file_name(0), "company profiles_data_page_1.csv");
        assert_eq!(endpoint.merged_file_name(), "Company Profiles_merged.csv");
        assert!(endpoint.is_page_file_name("company profiles_data_page_12.csv"));
        assert!(!endpoint.is_page_file_name("company profiles_data_page_x.csv"));
        assert!(!endpoint.is_page_file_name("jobs_data_page_1.csv"));
        assert_eq!(endpoint.table_name(), "company profiles_data");
    }

    #[test]
    fn test_field_selection_query() {
        assert_eq!(FieldSelection::All.as_query(), "_ALL");
        assert_eq!(FieldSelection::Only(&["id", "subject"]).as_query(), "id,subject");
    }

    #[test]
    fn test_default_endpoints_special_cases() {
        let endpoints = default_endpoints();
        assert_eq!(endpoints.len(), 19);

        let expenses = endpoints.iter().find(|e| e.label == "Expenses").unwrap();
        assert_eq!(expenses.records_key, Some("expenses"));

        let activities = endpoints.iter().find(|e| e.label == "Activities").unwrap();
        assert!(activities.fields.as_query().contains("billable"));

        let profiles: Vec<_> = endpoints
            .iter()
            .filter(|e| e.profile_attributes.is_some())
            .map(|e| e.label)
            .collect();
        assert_eq!(profiles, vec!["Company Profiles"]);
    }
}
