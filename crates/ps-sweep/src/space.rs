//! Parameter space definitions.

use ps_types::{config_error, ParameterValue, SweepResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::unit::Assignment;

/// One digit of the sweep: either an independent parameter or a group of
/// parameters that vary in lockstep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dimension {
    Parameter {
        values: Vec<ParameterValue>,
    },
    /// `values[m]` is the value sequence of `members[m]`; all sequences share
    /// one length and are index-aligned.
    Group {
        members: Vec<String>,
        values: Vec<Vec<ParameterValue>>,
    },
}

impl Dimension {
    /// Number of distinct positions this dimension contributes.
    pub fn radix(&self) -> usize {
        match self {
            Self::Parameter { values } => values.len(),
            Self::Group { values, .. } => values.first().map_or(0, Vec::len),
        }
    }

    pub(crate) fn assignment_at(&self, position: usize) -> Assignment {
        match self {
            Self::Parameter { values } => Assignment::Single(values[position].clone()),
            Self::Group { members, values } => Assignment::Group(
                members
                    .iter()
                    .zip(values)
                    .map(|(member, seq)| (member.clone(), seq[position].clone()))
                    .collect(),
            ),
        }
    }
}

/// A validated sweep definition.
///
/// Dimensions are keyed by name in an ordered map, so every traversal sees
/// them in lexicographic order. Only [`SpaceBuilder::build`] creates one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpace {
    dimensions: BTreeMap<String, Dimension>,
    unit_count: usize,
}

impl ParameterSpace {
    pub fn builder() -> SpaceBuilder {
        SpaceBuilder::new()
    }

    pub fn dimensions(&self) -> &BTreeMap<String, Dimension> {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.get(name)
    }

    /// Total number of work units: the product of all radices.
    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// Collects parameter and group declarations and validates them together.
#[derive(Debug, Clone, Default)]
pub struct SpaceBuilder {
    declared: Vec<(String, Dimension)>,
}

impl SpaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_parameter<V: Into<ParameterValue>>(
        mut self,
        name: impl Into<String>,
        values: Vec<V>,
    ) -> Self {
        self.declared.push((
            name.into(),
            Dimension::Parameter {
                values: values.into_iter().map(Into::into).collect(),
            },
        ));
        self
    }

    /// Declare a lockstep group. The group is named by joining its members
    /// with `-`.
    pub fn add_group<V: Into<ParameterValue>>(
        mut self,
        members: Vec<impl Into<String>>,
        values: Vec<Vec<V>>,
    ) -> Self {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        self.declared.push((
            members.join("-"),
            Dimension::Group {
                members,
                values: values
                    .into_iter()
                    .map(|seq| seq.into_iter().map(Into::into).collect())
                    .collect(),
            },
        ));
        self
    }

    pub fn build(self) -> SweepResult<ParameterSpace> {
        if self.declared.is_empty() {
            return Err(config_error!("sweep defines no parameters"));
        }

        // Dimension names and group member names share one namespace.
        let mut names: BTreeSet<String> = BTreeSet::new();

        for (name, dimension) in &self.declared {
            claim(&mut names, name)?;
            match dimension {
                Dimension::Parameter { values } => {
                    if values.is_empty() {
                        return Err(config_error!("parameter `{name}` has no values"));
                    }
                    let mut seen = BTreeSet::new();
                    for value in values {
                        let rendered = render(name, value)?;
                        if !seen.insert(rendered) {
                            return Err(config_error!(
                                "parameter `{name}` lists `{value}` more than once"
                            ));
                        }
                    }
                }
                Dimension::Group { members, values } => {
                    if members.len() < 2 {
                        return Err(config_error!(
                            "group `{name}` needs at least two members, got {}",
                            members.len()
                        ));
                    }
                    if values.len() != members.len() {
                        return Err(config_error!(
                            "group `{name}` has {} members but {} value lists",
                            members.len(),
                            values.len()
                        ));
                    }
                    let expected = values[0].len();
                    if expected == 0 {
                        return Err(config_error!("group `{name}` has no values"));
                    }
                    for (member, seq) in members.iter().zip(values) {
                        if seq.len() != expected {
                            return Err(config_error!(
                                "group `{name}`: member `{member}` has {} values, expected {expected}",
                                seq.len()
                            ));
                        }
                    }
                    let mut seen = BTreeSet::new();
                    for row in 0..expected {
                        let rendered = members
                            .iter()
                            .zip(values)
                            .map(|(member, seq)| render(member, &seq[row]))
                            .collect::<SweepResult<Vec<String>>>()?;
                        if !seen.insert(rendered) {
                            return Err(config_error!(
                                "group `{name}` repeats the combination at position {row}"
                            ));
                        }
                    }
                    for member in members {
                        claim(&mut names, member)?;
                    }
                }
            }
        }

        let mut unit_count: usize = 1;
        for (name, dimension) in &self.declared {
            unit_count = unit_count.checked_mul(dimension.radix()).ok_or_else(|| {
                config_error!("sweep is too large: unit count overflows at `{name}`")
            })?;
        }

        Ok(ParameterSpace {
            dimensions: self.declared.into_iter().collect(),
            unit_count,
        })
    }
}

/// The text a value contributes to unit names and directory names.
fn render(name: &str, value: &ParameterValue) -> SweepResult<String> {
    let rendered = value.to_string();
    if rendered.contains(['/', '\\']) || rendered == "." || rendered == ".." {
        return Err(config_error!(
            "value `{rendered}` of `{name}` cannot be part of a directory name"
        ));
    }
    Ok(rendered)
}

fn claim(names: &mut BTreeSet<String>, name: &str) -> SweepResult<()> {
    if name.is_empty() {
        return Err(config_error!("parameter names must not be empty"));
    }
    // Names end up in unit directory names.
    if name.contains(['/', '\\']) {
        return Err(config_error!("parameter name `{name}` contains a path separator"));
    }
    if !names.insert(name.to_string()) {
        return Err(config_error!(
            "parameter name `{name}` is declared more than once"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_types::SweepError;

    fn expect_config_error(result: SweepResult<ParameterSpace>, needle: &str) {
        match result {
            Err(SweepError::Config(message)) => {
                assert!(message.contains(needle), "unexpected message: {message}")
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn unit_count_is_product_of_radices() {
        let space = ParameterSpace::builder()
            .add_parameter("N", vec![56, 100, 375])
            .add_parameter("Ez", vec![0, 12, 22])
            .add_parameter("mode", vec!["te", "tm"])
            .build()
            .unwrap();
        assert_eq!(space.unit_count(), 18);
        assert_eq!(space.len(), 3);
    }

    #[test]
    fn group_contributes_one_dimension() {
        let space = ParameterSpace::builder()
            .add_group(vec!["a", "b"], vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]])
            .build()
            .unwrap();
        assert_eq!(space.unit_count(), 4);
        assert!(matches!(
            space.dimension("a-b"),
            Some(Dimension::Group { members, .. }) if members == &["a", "b"]
        ));
    }

    #[test]
    fn dimensions_iterate_lexicographically() {
        let space = ParameterSpace::builder()
            .add_parameter("zeta", vec![1])
            .add_parameter("alpha", vec![1])
            .add_parameter("mu", vec![1])
            .build()
            .unwrap();
        let names: Vec<&str> = space.dimensions().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["alpha", "mu", "zeta"]);
    }

    #[test]
    fn empty_space_is_rejected() {
        expect_config_error(SpaceBuilder::new().build(), "no parameters");
    }

    #[test]
    fn empty_value_list_is_rejected() {
        let empty: Vec<i64> = Vec::new();
        expect_config_error(
            ParameterSpace::builder().add_parameter("x", empty).build(),
            "has no values",
        );
    }

    #[test]
    fn ragged_group_is_rejected() {
        expect_config_error(
            ParameterSpace::builder()
                .add_group(vec!["a", "b"], vec![vec![0, 1, 2], vec![4, 5]])
                .build(),
            "member `b` has 2 values, expected 3",
        );
    }

    #[test]
    fn single_member_group_is_rejected() {
        expect_config_error(
            ParameterSpace::builder()
                .add_group(vec!["a"], vec![vec![0, 1]])
                .build(),
            "at least two members",
        );
    }

    #[test]
    fn group_value_lists_must_match_members() {
        expect_config_error(
            ParameterSpace::builder()
                .add_group(vec!["a", "b", "c"], vec![vec![0], vec![1]])
                .build(),
            "3 members but 2 value lists",
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        expect_config_error(
            ParameterSpace::builder()
                .add_parameter("x", vec![1])
                .add_parameter("x", vec![2])
                .build(),
            "`x` is declared more than once",
        );
    }

    #[test]
    fn member_may_not_shadow_plain_parameter() {
        expect_config_error(
            ParameterSpace::builder()
                .add_parameter("a", vec![1, 2])
                .add_group(vec!["a", "b"], vec![vec![0, 1], vec![4, 5]])
                .build(),
            "`a` is declared more than once",
        );
    }

    #[test]
    fn group_name_may_not_collide_with_parameter() {
        expect_config_error(
            ParameterSpace::builder()
                .add_parameter("a-b", vec![1])
                .add_group(vec!["a", "b"], vec![vec![0], vec![4]])
                .build(),
            "`a-b` is declared more than once",
        );
    }

    #[test]
    fn overflowing_sweep_is_rejected() {
        let values: Vec<i64> = (0..1 << 16).collect();
        let mut builder = ParameterSpace::builder();
        for name in ["p0", "p1", "p2", "p3", "p4"] {
            builder = builder.add_parameter(name, values.clone());
        }
        expect_config_error(builder.build(), "overflows");
    }

    #[test]
    fn repeated_value_is_rejected() {
        expect_config_error(
            ParameterSpace::builder().add_parameter("a", vec![3, 3]).build(),
            "lists `3` more than once",
        );
    }

    #[test]
    fn values_rendering_alike_are_rejected() {
        let values = vec![ParameterValue::Int(1), ParameterValue::from("1")];
        expect_config_error(
            ParameterSpace::builder().add_parameter("a", values).build(),
            "more than once",
        );
    }

    #[test]
    fn int_and_integral_float_stay_distinct() {
        let values = vec![ParameterValue::Int(1), ParameterValue::Float(1.0)];
        let space = ParameterSpace::builder()
            .add_parameter("a", values)
            .build()
            .unwrap();
        assert_eq!(space.unit_count(), 2);
    }

    #[test]
    fn repeated_group_row_is_rejected() {
        expect_config_error(
            ParameterSpace::builder()
                .add_group(vec!["a", "b"], vec![vec![0, 1, 0], vec![4, 5, 4]])
                .build(),
            "repeats the combination at position 2",
        );
    }

    #[test]
    fn group_column_may_repeat_when_rows_differ() {
        let space = ParameterSpace::builder()
            .add_group(vec!["a", "b"], vec![vec![0, 0], vec![4, 5]])
            .build()
            .unwrap();
        assert_eq!(space.unit_count(), 2);
    }

    #[test]
    fn values_that_leave_the_study_root_are_rejected() {
        for bad in ["/../../escaped", "..", ".", "a\\b"] {
            expect_config_error(
                ParameterSpace::builder().add_parameter("x", vec![bad]).build(),
                "cannot be part of a directory name",
            );
        }
        expect_config_error(
            ParameterSpace::builder()
                .add_group(vec!["a", "b"], vec![vec!["ok"], vec!["../up"]])
                .build(),
            "cannot be part of a directory name",
        );
    }

    #[test]
    fn path_separator_in_name_is_rejected() {
        expect_config_error(
            ParameterSpace::builder().add_parameter("a/b", vec![1]).build(),
            "path separator",
        );
    }
}
