use failure::Fail;

/// Whether captured varyings each get their own output buffer or share one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FeedbackMode {
    /// Every varying is captured into its own buffer binding.
    Separate,
    /// Varyings accumulate into a shared buffer binding until a
    /// [VaryingDescriptor::NextBuffer] marker advances to the next one.
    Interleaved,
}

/// One element of a transform-feedback capture layout.
///
/// A layout is an ordered sequence of these: real named outputs interspersed
/// with pseudo-descriptors that only affect how the device packs the capture.
/// The pseudo-descriptors are meaningful in [FeedbackMode::Interleaved] only.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum VaryingDescriptor {
    /// A named output captured into a buffer.
    Varying(String),
    /// Advances capture to the next output buffer binding.
    NextBuffer,
    /// Leaves a gap of 1 component in the capture.
    SkipComponents1,
    /// Leaves a gap of 2 components in the capture.
    SkipComponents2,
    /// Leaves a gap of 3 components in the capture.
    SkipComponents3,
    /// Leaves a gap of 4 components in the capture.
    SkipComponents4,
}

impl VaryingDescriptor {
    /// Whether this is one of the four pseudo-descriptors.
    pub fn is_pseudo(&self) -> bool {
        match self {
            VaryingDescriptor::Varying(_) => false,
            _ => true,
        }
    }

    /// The name this descriptor contributes to the device link call.
    ///
    /// Pseudo-descriptors are spelled with their reserved keywords.
    pub fn device_name(&self) -> &str {
        match self {
            VaryingDescriptor::Varying(name) => name,
            VaryingDescriptor::NextBuffer => "gl_NextBuffer",
            VaryingDescriptor::SkipComponents1 => "gl_SkipComponents1",
            VaryingDescriptor::SkipComponents2 => "gl_SkipComponents2",
            VaryingDescriptor::SkipComponents3 => "gl_SkipComponents3",
            VaryingDescriptor::SkipComponents4 => "gl_SkipComponents4",
        }
    }
}

/// A descriptor with its assigned output buffer binding index.
#[derive(Clone, PartialEq, Debug)]
pub struct VaryingAssignment {
    pub descriptor: VaryingDescriptor,
    pub index: u32,
}

/// A validated transform-feedback capture layout with every descriptor's
/// buffer binding index resolved.
///
/// Built with a [TransformFeedbackLayoutBuilder]; index assignment runs once,
/// when the builder finishes, and the result is immutable afterward.
#[derive(Clone, PartialEq, Debug)]
pub struct TransformFeedbackLayout {
    mode: FeedbackMode,
    assignments: Vec<VaryingAssignment>,
}

impl TransformFeedbackLayout {
    pub fn mode(&self) -> FeedbackMode {
        self.mode
    }

    /// Every descriptor in declaration order, with its assigned index.
    pub fn assignments(&self) -> &[VaryingAssignment] {
        &self.assignments
    }

    /// The buffer binding index the named varying is captured into.
    pub fn varying_index(&self, name: &str) -> Option<u32> {
        self.assignments.iter().find_map(|assignment| {
            if let VaryingDescriptor::Varying(candidate) = &assignment.descriptor {
                if candidate == name {
                    return Some(assignment.index);
                }
            }

            None
        })
    }

    /// The number of output buffer bindings the layout spans.
    pub fn binding_count(&self) -> u32 {
        self.assignments
            .iter()
            .map(|assignment| assignment.index + 1)
            .max()
            .unwrap_or(0)
    }

    /// The ordered name list handed to the device link call, pseudo-keywords
    /// included.
    pub fn device_names(&self) -> Vec<String> {
        self.assignments
            .iter()
            .map(|assignment| assignment.descriptor.device_name().to_string())
            .collect()
    }
}

/// Builds a [TransformFeedbackLayout].
///
/// # Example
///
/// ```rust
/// use gl_stream::transform_feedback::{FeedbackMode, TransformFeedbackLayoutBuilder};
///
/// let layout = TransformFeedbackLayoutBuilder::new(FeedbackMode::Interleaved)
///     .varying("v_position")
///     .skip_components(1)
///     .next_buffer()
///     .varying("v_velocity")
///     .finish()
///     .unwrap();
///
/// assert_eq!(layout.varying_index("v_position"), Some(0));
/// assert_eq!(layout.varying_index("v_velocity"), Some(1));
/// ```
pub struct TransformFeedbackLayoutBuilder {
    mode: FeedbackMode,
    descriptors: Vec<VaryingDescriptor>,
}

impl TransformFeedbackLayoutBuilder {
    pub fn new(mode: FeedbackMode) -> Self {
        TransformFeedbackLayoutBuilder {
            mode,
            descriptors: Vec::new(),
        }
    }

    /// Appends a real named output.
    pub fn varying<N>(mut self, name: N) -> Self
    where
        N: Into<String>,
    {
        self.descriptors
            .push(VaryingDescriptor::Varying(name.into()));

        self
    }

    /// Appends a marker advancing capture to the next output buffer.
    pub fn next_buffer(mut self) -> Self {
        self.descriptors.push(VaryingDescriptor::NextBuffer);

        self
    }

    /// Appends a marker leaving a gap of `count` components.
    ///
    /// # Panics
    ///
    /// Panics unless `count` is in `1..=4`.
    pub fn skip_components(mut self, count: usize) -> Self {
        let descriptor = match count {
            1 => VaryingDescriptor::SkipComponents1,
            2 => VaryingDescriptor::SkipComponents2,
            3 => VaryingDescriptor::SkipComponents3,
            4 => VaryingDescriptor::SkipComponents4,
            _ => panic!("Skip component count must be in 1..=4, got {}", count),
        };

        self.descriptors.push(descriptor);

        self
    }

    /// Runs index assignment and returns the finished layout.
    pub fn finish(self) -> Result<TransformFeedbackLayout, FeedbackLayoutError> {
        let assignments = assign_indices(self.descriptors, self.mode)?;

        Ok(TransformFeedbackLayout {
            mode: self.mode,
            assignments,
        })
    }
}

/// Assigns each descriptor the output buffer binding index it lands on.
///
/// In [FeedbackMode::Separate] every descriptor must be a real varying and
/// each gets the next sequential index. In [FeedbackMode::Interleaved]
/// descriptors accumulate into the current index; only a
/// [VaryingDescriptor::NextBuffer] marker advances it (the marker itself is
/// assigned the index it closes).
fn assign_indices(
    descriptors: Vec<VaryingDescriptor>,
    mode: FeedbackMode,
) -> Result<Vec<VaryingAssignment>, FeedbackLayoutError> {
    let mut assignments = Vec::with_capacity(descriptors.len());
    let mut index = 0;

    for descriptor in descriptors {
        if mode == FeedbackMode::Separate && descriptor.is_pseudo() {
            return Err(FeedbackLayoutError::PseudoVaryingInSeparateMode {
                keyword: descriptor.device_name().to_string(),
            });
        }

        let advance = mode == FeedbackMode::Separate || descriptor == VaryingDescriptor::NextBuffer;

        assignments.push(VaryingAssignment { descriptor, index });

        if advance {
            index += 1;
        }
    }

    Ok(assignments)
}

/// Errors raised while validating a transform-feedback capture layout.
#[derive(Fail, Clone, PartialEq, Debug)]
pub enum FeedbackLayoutError {
    #[fail(
        display = "`{}` requires interleaved capture; separate mode captures one varying per buffer",
        keyword
    )]
    PseudoVaryingInSeparateMode { keyword: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(layout: &TransformFeedbackLayout) -> Vec<u32> {
        layout
            .assignments()
            .iter()
            .map(|assignment| assignment.index)
            .collect()
    }

    #[test]
    fn separate_mode_assigns_sequential_indices() {
        let layout = TransformFeedbackLayoutBuilder::new(FeedbackMode::Separate)
            .varying("v_position")
            .varying("v_velocity")
            .finish()
            .unwrap();

        assert_eq!(indices(&layout), vec![0, 1]);
        assert_eq!(layout.varying_index("v_position"), Some(0));
        assert_eq!(layout.varying_index("v_velocity"), Some(1));
        assert_eq!(layout.binding_count(), 2);
    }

    #[test]
    fn separate_mode_rejects_pseudo_descriptors() {
        let result = TransformFeedbackLayoutBuilder::new(FeedbackMode::Separate)
            .varying("v_position")
            .next_buffer()
            .varying("v_velocity")
            .finish();

        assert_eq!(
            result,
            Err(FeedbackLayoutError::PseudoVaryingInSeparateMode {
                keyword: "gl_NextBuffer".to_string()
            })
        );

        let result = TransformFeedbackLayoutBuilder::new(FeedbackMode::Separate)
            .skip_components(2)
            .finish();

        assert_eq!(
            result,
            Err(FeedbackLayoutError::PseudoVaryingInSeparateMode {
                keyword: "gl_SkipComponents2".to_string()
            })
        );
    }

    #[test]
    fn interleaved_mode_accumulates_into_one_binding() {
        let layout = TransformFeedbackLayoutBuilder::new(FeedbackMode::Interleaved)
            .varying("v_position")
            .skip_components(1)
            .varying("v_velocity")
            .finish()
            .unwrap();

        assert_eq!(indices(&layout), vec![0, 0, 0]);
        assert_eq!(layout.binding_count(), 1);
    }

    #[test]
    fn next_buffer_advances_the_binding_index() {
        let layout = TransformFeedbackLayoutBuilder::new(FeedbackMode::Interleaved)
            .varying("v_position")
            .next_buffer()
            .varying("v_velocity")
            .finish()
            .unwrap();

        assert_eq!(indices(&layout), vec![0, 1, 1]);
        assert_eq!(layout.varying_index("v_position"), Some(0));
        assert_eq!(layout.varying_index("v_velocity"), Some(1));
        assert_eq!(layout.binding_count(), 2);
    }

    #[test]
    fn device_names_spell_pseudo_keywords() {
        let layout = TransformFeedbackLayoutBuilder::new(FeedbackMode::Interleaved)
            .varying("v_position")
            .skip_components(4)
            .next_buffer()
            .varying("v_velocity")
            .finish()
            .unwrap();

        assert_eq!(
            layout.device_names(),
            vec![
                "v_position".to_string(),
                "gl_SkipComponents4".to_string(),
                "gl_NextBuffer".to_string(),
                "v_velocity".to_string(),
            ]
        );
    }

    #[test]
    #[should_panic(expected = "Skip component count must be in 1..=4")]
    fn skip_component_count_out_of_range_panics() {
        TransformFeedbackLayoutBuilder::new(FeedbackMode::Interleaved).skip_components(5);
    }
}
