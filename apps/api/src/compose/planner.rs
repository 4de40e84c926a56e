//! Section Planner — turns the configured section descriptors into the
//! ordered list of sections the builder lays out.
//!
//! # Composition rule
//! When both `paymentMethod` and `contactInfo` are enabled they merge into a
//! single two-column section placed where `paymentMethod` sorts, even if one
//! side has no populated fields. When only one of them is enabled it gets a
//! single-column section, but only if it has something to show.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::models::template::{ContactInfoConfig, PaymentMethodConfig};
use crate::models::{SectionDescriptor, SectionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlannedSection {
    JobSummary,
    ProjectInfo,
    ItemsTable,
    TwoColumn,
    PaymentOnly,
    ContactOnly,
}

pub fn plan(
    sections: &[SectionDescriptor],
    payment: &PaymentMethodConfig,
    contact: &ContactInfoConfig,
) -> Vec<PlannedSection> {
    let mut enabled: Vec<(SectionId, i64)> = sections
        .iter()
        .filter(|descriptor| descriptor.enabled)
        .filter_map(|descriptor| match descriptor.section_id() {
            Some(id) => Some((id, descriptor.order)),
            None => {
                debug!(id = %descriptor.id, "Ignoring unknown section id");
                None
            }
        })
        .collect();

    // `sort_by_key` is stable: equal orders keep their configured sequence.
    enabled.sort_by_key(|(_, order)| *order);

    let merge = enabled.iter().any(|(id, _)| *id == SectionId::PaymentMethod)
        && enabled.iter().any(|(id, _)| *id == SectionId::ContactInfo);

    let mut seen = HashSet::new();
    let mut planned = Vec::with_capacity(enabled.len());

    for (id, _) in enabled {
        if !seen.insert(id) {
            continue;
        }
        let section = match id {
            SectionId::JobSummary => Some(PlannedSection::JobSummary),
            SectionId::ProjectInfo => Some(PlannedSection::ProjectInfo),
            SectionId::ItemsTable => Some(PlannedSection::ItemsTable),
            SectionId::PaymentMethod if merge => Some(PlannedSection::TwoColumn),
            SectionId::ContactInfo if merge => None,
            SectionId::PaymentMethod => payment
                .has_content()
                .then_some(PlannedSection::PaymentOnly),
            SectionId::ContactInfo => contact
                .has_content()
                .then_some(PlannedSection::ContactOnly),
        };
        planned.extend(section);
    }

    debug!(?planned, "Section plan resolved");
    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::template::default_sections;

    fn descriptor(id: &str, enabled: bool, order: i64) -> SectionDescriptor {
        SectionDescriptor {
            id: id.to_string(),
            enabled,
            order,
        }
    }

    fn bank_only() -> PaymentMethodConfig {
        PaymentMethodConfig {
            bank_name: Some("First National".to_string()),
            ..Default::default()
        }
    }

    fn email_only() -> ContactInfoConfig {
        ContactInfoConfig {
            email: Some("office@acme.test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_payment_and_contact_merge_into_one_two_column() {
        let sections = vec![
            descriptor("paymentMethod", true, 1),
            descriptor("contactInfo", true, 2),
        ];
        let planned = plan(&sections, &bank_only(), &email_only());
        assert_eq!(planned, vec![PlannedSection::TwoColumn]);
    }

    #[test]
    fn test_merge_holds_when_one_side_is_empty() {
        let sections = vec![
            descriptor("contactInfo", true, 1),
            descriptor("paymentMethod", true, 5),
        ];
        let planned = plan(&sections, &PaymentMethodConfig::default(), &email_only());
        assert_eq!(planned, vec![PlannedSection::TwoColumn]);
    }

    #[test]
    fn test_two_column_sits_at_payment_position() {
        let sections = vec![
            descriptor("contactInfo", true, 1),
            descriptor("itemsTable", true, 2),
            descriptor("paymentMethod", true, 3),
        ];
        let planned = plan(&sections, &bank_only(), &email_only());
        assert_eq!(
            planned,
            vec![PlannedSection::ItemsTable, PlannedSection::TwoColumn]
        );
    }

    #[test]
    fn test_empty_payment_alone_is_omitted() {
        let sections = vec![
            descriptor("itemsTable", true, 1),
            descriptor("paymentMethod", true, 2),
            descriptor("contactInfo", false, 3),
        ];
        let planned = plan(&sections, &PaymentMethodConfig::default(), &email_only());
        assert_eq!(planned, vec![PlannedSection::ItemsTable]);
    }

    #[test]
    fn test_single_side_with_content_is_single_column() {
        let sections = vec![
            descriptor("paymentMethod", false, 1),
            descriptor("contactInfo", true, 2),
        ];
        let planned = plan(&sections, &bank_only(), &email_only());
        assert_eq!(planned, vec![PlannedSection::ContactOnly]);

        let sections = vec![descriptor("paymentMethod", true, 1)];
        let planned = plan(&sections, &bank_only(), &ContactInfoConfig::default());
        assert_eq!(planned, vec![PlannedSection::PaymentOnly]);
    }

    #[test]
    fn test_sorted_by_order_with_stable_ties() {
        let sections = vec![
            descriptor("itemsTable", true, 10),
            descriptor("projectInfo", true, 3),
            descriptor("jobSummary", true, 3),
        ];
        let planned = plan(
            &sections,
            &PaymentMethodConfig::default(),
            &ContactInfoConfig::default(),
        );
        assert_eq!(
            planned,
            vec![
                PlannedSection::ProjectInfo,
                PlannedSection::JobSummary,
                PlannedSection::ItemsTable
            ]
        );
    }

    #[test]
    fn test_disabled_and_unknown_sections_skipped() {
        let sections = vec![
            descriptor("jobSummary", false, 1),
            descriptor("galleryStrip", true, 2),
            descriptor("itemsTable", true, 3),
        ];
        let planned = plan(
            &sections,
            &PaymentMethodConfig::default(),
            &ContactInfoConfig::default(),
        );
        assert_eq!(planned, vec![PlannedSection::ItemsTable]);
    }

    #[test]
    fn test_duplicate_ids_keep_first_occurrence() {
        let sections = vec![
            descriptor("itemsTable", true, 2),
            descriptor("itemsTable", true, 1),
            descriptor("jobSummary", true, 1),
        ];
        let planned = plan(
            &sections,
            &PaymentMethodConfig::default(),
            &ContactInfoConfig::default(),
        );
        assert_eq!(
            planned,
            vec![PlannedSection::ItemsTable, PlannedSection::JobSummary]
        );
    }

    #[test]
    fn test_default_sections_plan() {
        let planned = plan(&default_sections(), &bank_only(), &ContactInfoConfig::default());
        assert_eq!(
            planned,
            vec![
                PlannedSection::JobSummary,
                PlannedSection::ProjectInfo,
                PlannedSection::ItemsTable,
                PlannedSection::TwoColumn
            ]
        );
    }
}
