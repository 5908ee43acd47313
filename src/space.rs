//! State/action space enumeration and dense ID assignment.
//!
//! An external collaborator in the overall system; the coordinator only
//! needs the interface below. States and actions are tuples over ordered
//! discrete axes; dense IDs use mixed-radix encoding with the first axis
//! varying slowest (cartesian-product order), which fixes row/column order
//! for the exported tables.

/// One discrete axis: named, labeled variants with numeric values.
#[derive(Debug, Clone)]
pub struct Enumeration {
    name: String,
    labels: Vec<String>,
    values: Vec<f64>,
    default_index: usize,
}

impl Enumeration {
    /// Create an axis from `(label, value)` variants.
    ///
    /// The first variant is the default unless overridden.
    pub fn new(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = (&'static str, f64)>,
    ) -> Self {
        let (labels, values): (Vec<String>, Vec<f64>) = variants
            .into_iter()
            .map(|(label, value)| (label.to_string(), value))
            .unzip();
        assert!(!labels.is_empty(), "enumeration must have variants");
        Self {
            name: name.into(),
            labels,
            values,
            default_index: 0,
        }
    }

    /// Mark a different variant as the default.
    pub fn with_default(mut self, index: usize) -> Self {
        assert!(index < self.labels.len(), "default index out of range");
        self.default_index = index;
        self
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of variants.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the axis has no variants (never true after construction).
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Variant labels in declaration order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Numeric value of one variant.
    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    /// Ordinal of the default variant.
    pub fn default_index(&self) -> usize {
        self.default_index
    }

    /// Minimum and maximum numeric value over all variants.
    pub fn bounds(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &value in &self.values {
            min = min.min(value);
            max = max.max(value);
        }
        (min, max)
    }
}

/// Maps discrete state and action tuples to dense integer indices and back.
#[derive(Debug, Clone)]
pub struct StateSpace {
    states: Vec<Enumeration>,
    actions: Vec<Enumeration>,
    num_states: usize,
    num_actions: usize,
}

impl StateSpace {
    /// Build a space from ordered state axes and ordered action axes.
    pub fn new(states: Vec<Enumeration>, actions: Vec<Enumeration>) -> Self {
        assert!(!states.is_empty(), "at least one state enumeration required");
        assert!(
            !actions.is_empty(),
            "at least one action enumeration required"
        );
        let num_states = states.iter().map(Enumeration::len).product();
        let num_actions = actions.iter().map(Enumeration::len).product();
        Self {
            states,
            actions,
            num_states,
            num_actions,
        }
    }

    /// Total number of distinct states.
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Total number of distinct actions.
    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Number of variants per state axis.
    pub fn shape_of_states(&self) -> Vec<usize> {
        self.states.iter().map(Enumeration::len).collect()
    }

    /// Number of variants per action axis.
    pub fn shape_of_actions(&self) -> Vec<usize> {
        self.actions.iter().map(Enumeration::len).collect()
    }

    /// Dense ID for a state tuple, or `None` if the tuple is out of range.
    pub fn state_id(&self, point: &[usize]) -> Option<usize> {
        index_of(&self.states, point)
    }

    /// State tuple for a dense ID, or `None` if the ID is out of range.
    pub fn state_from_id(&self, id: usize) -> Option<Vec<usize>> {
        point_of(&self.states, self.num_states, id)
    }

    /// Dense ID for an action tuple, or `None` if the tuple is out of range.
    pub fn action_id(&self, point: &[usize]) -> Option<usize> {
        index_of(&self.actions, point)
    }

    /// Action tuple for a dense ID, or `None` if the ID is out of range.
    pub fn action_from_id(&self, id: usize) -> Option<Vec<usize>> {
        point_of(&self.actions, self.num_actions, id)
    }

    /// The default state tuple (each axis at its default variant).
    pub fn default_state(&self) -> Vec<usize> {
        self.states.iter().map(Enumeration::default_index).collect()
    }

    /// Numeric values of a state tuple, one component per axis.
    pub fn state_values(&self, point: &[usize]) -> Vec<f64> {
        self.states
            .iter()
            .zip(point)
            .map(|(axis, &index)| axis.value(index))
            .collect()
    }

    /// Numeric values of the default state.
    pub fn default_state_values(&self) -> Vec<f64> {
        self.state_values(&self.default_state())
    }

    /// `(min, max)` numeric value per state axis.
    pub fn state_bounds(&self) -> Vec<(f64, f64)> {
        self.states.iter().map(Enumeration::bounds).collect()
    }

    /// Human-readable label for a state ID: axis labels joined with `/`.
    pub fn state_label(&self, id: usize) -> Option<String> {
        let point = self.state_from_id(id)?;
        Some(label_of(&self.states, &point))
    }

    /// Human-readable label for an action ID: axis labels joined with `/`.
    pub fn action_label(&self, id: usize) -> Option<String> {
        let point = self.action_from_id(id)?;
        Some(label_of(&self.actions, &point))
    }
}

fn index_of(axes: &[Enumeration], point: &[usize]) -> Option<usize> {
    if point.len() != axes.len() {
        return None;
    }
    let mut id = 0;
    for (axis, &index) in axes.iter().zip(point) {
        if index >= axis.len() {
            return None;
        }
        id = id * axis.len() + index;
    }
    Some(id)
}

fn point_of(axes: &[Enumeration], total: usize, id: usize) -> Option<Vec<usize>> {
    if id >= total {
        return None;
    }
    let mut remainder = id;
    let mut point = vec![0; axes.len()];
    for (slot, axis) in point.iter_mut().zip(axes).rev() {
        *slot = remainder % axis.len();
        remainder /= axis.len();
    }
    Some(point)
}

fn label_of(axes: &[Enumeration], point: &[usize]) -> String {
    axes.iter()
        .zip(point)
        .map(|(axis, &index)| axis.labels()[index].as_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_by_three_space() -> StateSpace {
        StateSpace::new(
            vec![
                Enumeration::new("POWER", [("LOW", 0.0), ("MID", 1.0), ("HIGH", 2.0)]),
                Enumeration::new("RANGE", [("NEAR", 0.0), ("FAR", 1.0), ("OUT", 2.0)])
                    .with_default(1),
            ],
            vec![Enumeration::new(
                "MOVE",
                [("N", 0.0), ("S", 1.0), ("E", 2.0), ("W", 3.0)],
            )],
        )
    }

    #[test]
    fn test_space_sizes() {
        let space = three_by_three_space();
        assert_eq!(space.num_states(), 9);
        assert_eq!(space.num_actions(), 4);
        assert_eq!(space.shape_of_states(), vec![3, 3]);
        assert_eq!(space.shape_of_actions(), vec![4]);
    }

    #[test]
    fn test_id_round_trip() {
        let space = three_by_three_space();
        for id in 0..space.num_states() {
            let point = space.state_from_id(id).unwrap();
            assert_eq!(space.state_id(&point), Some(id));
        }
        // First axis varies slowest.
        assert_eq!(space.state_id(&[0, 0]), Some(0));
        assert_eq!(space.state_id(&[0, 2]), Some(2));
        assert_eq!(space.state_id(&[1, 0]), Some(3));
        assert_eq!(space.state_id(&[2, 2]), Some(8));
    }

    #[test]
    fn test_out_of_range_points() {
        let space = three_by_three_space();
        assert_eq!(space.state_id(&[3, 0]), None);
        assert_eq!(space.state_id(&[0]), None);
        assert_eq!(space.state_from_id(9), None);
        assert_eq!(space.action_id(&[4]), None);
    }

    #[test]
    fn test_default_state_and_values() {
        let space = three_by_three_space();
        assert_eq!(space.default_state(), vec![0, 1]);
        assert_eq!(space.default_state_values(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_bounds() {
        let space = three_by_three_space();
        assert_eq!(space.state_bounds(), vec![(0.0, 2.0), (0.0, 2.0)]);
    }

    #[test]
    fn test_labels() {
        let space = three_by_three_space();
        assert_eq!(space.state_label(0).unwrap(), "LOW/NEAR");
        assert_eq!(space.state_label(5).unwrap(), "MID/OUT");
        assert_eq!(space.action_label(2).unwrap(), "E");
        assert_eq!(space.state_label(9), None);
    }
}
