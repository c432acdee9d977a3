//! Partitions a snapshot's flat element list into validation groups.

use std::collections::HashSet;

use crate::types::{CHOICE_MARKER, ElementDefinition};

/// Result of classifying one snapshot.
///
/// Each group is a stable sub-sequence of the input. Backbone container
/// elements are recorded by id only and appear in no group.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ElementGroups<'a> {
    pub top_level: Vec<&'a ElementDefinition>,
    pub backbone_nested: Vec<&'a ElementDefinition>,
    pub choice: Vec<&'a ElementDefinition>,
    pub backbone_ids: HashSet<&'a str>,
}

/// Single left-to-right pass; a container always precedes its children in a
/// snapshot, so its id is known by the time they are classified.
pub fn classify(elements: &[ElementDefinition]) -> ElementGroups<'_> {
    let mut groups = ElementGroups::default();

    for element in elements {
        if element.is_backbone() {
            groups.backbone_ids.insert(element.element_id());
        } else if element.is_choice() {
            groups.choice.push(element);
        } else if is_nested_in_backbone(&element.path, &groups.backbone_ids) {
            groups.backbone_nested.push(element);
        } else if !element.path.contains(CHOICE_MARKER) {
            groups.top_level.push(element);
        }
    }

    groups
}

fn is_nested_in_backbone(path: &str, backbone_ids: &HashSet<&str>) -> bool {
    backbone_ids.iter().any(|id| {
        path.strip_prefix(id)
            .is_some_and(|rest| rest.starts_with('.'))
    })
}
