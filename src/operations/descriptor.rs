//! Operation kinds and descriptors

use std::fmt;

/// A kind of operation: its registry key plus input and output types
///
/// Implemented on a marker type per operation:
///
/// ```rust,ignore
/// struct CreateAsset;
///
/// impl Operation for CreateAsset {
///     const KIND: &'static str = "CreateAsset";
///     type Input = CreateAssetInput;
///     type Output = CreateAssetOutput;
/// }
/// ```
pub trait Operation: Send + Sync + 'static {
    /// Registry lookup key, unique per operation
    const KIND: &'static str;

    type Input: Send + 'static;
    type Output: Send + 'static;

    fn descriptor(input: Self::Input) -> OperationDescriptor<Self>
    where
        Self: Sized,
    {
        OperationDescriptor::new(input)
    }
}

/// Stateless request value: an operation kind and its input
pub struct OperationDescriptor<O: Operation> {
    pub input: O::Input,
}

impl<O: Operation> OperationDescriptor<O> {
    pub fn new(input: O::Input) -> Self {
        Self { input }
    }

    pub fn kind(&self) -> &'static str {
        O::KIND
    }

    pub fn into_input(self) -> O::Input {
        self.input
    }
}

impl<O: Operation> Clone for OperationDescriptor<O>
where
    O::Input: Clone,
{
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
        }
    }
}

impl<O: Operation> fmt::Debug for OperationDescriptor<O>
where
    O::Input: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("kind", &O::KIND)
            .field("input", &self.input)
            .finish()
    }
}
