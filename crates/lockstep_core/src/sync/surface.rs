//! Surface replacement handshake between the controller and render roles.

/// A surface handed from the controller to the render role.
///
/// The render role applies it inside its current render step and reports the
/// result through [`FrameSynchronizer::render_finished`].
///
/// [`FrameSynchronizer::render_finished`]: crate::FrameSynchronizer::render_finished
#[derive(Debug)]
pub struct SurfaceReplaceRequest<S> {
    surface: S,
}

impl<S> SurfaceReplaceRequest<S> {
    pub(crate) fn new(surface: S) -> Self {
        Self { surface }
    }

    /// The replacement surface.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access to the replacement surface.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Takes ownership of the replacement surface.
    #[must_use]
    pub fn into_surface(self) -> S {
        self.surface
    }
}

/// Result of a replace request, reported by the render role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceReplaceOutcome {
    /// The new surface is now in use.
    Replaced,
    /// The swap failed; the previous surface is still in use.
    Failed,
}

impl SurfaceReplaceOutcome {
    /// Returns true for [`SurfaceReplaceOutcome::Replaced`].
    #[must_use]
    pub const fn is_replaced(self) -> bool {
        matches!(self, Self::Replaced)
    }
}

/// Controller-side bookkeeping for the single outstanding request.
#[derive(Debug)]
pub(crate) struct SurfaceSlot<S> {
    /// Surface waiting for the render role to pick it up.
    pub(crate) pending: Option<S>,
    /// Set by the render role once the request is processed.
    pub(crate) outcome: Option<SurfaceReplaceOutcome>,
}

impl<S> SurfaceSlot<S> {
    pub(crate) const fn empty() -> Self {
        Self {
            pending: None,
            outcome: None,
        }
    }
}
