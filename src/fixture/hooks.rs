use crate::errors::Result;
use crate::fixture::SelftestFixture;

/// Extension points run at the end of per-test setup and teardown.
///
/// Both methods default to no-ops, so an implementation only overrides the
/// side it cares about. The fixture is passed in so hooks can use the
/// config helpers and cleanup tracking.
pub trait FixtureHooks {
    fn set_up_local(&mut self, _fixture: &mut SelftestFixture) -> Result<()> {
        Ok(())
    }

    fn tear_down_local(&mut self, _fixture: &mut SelftestFixture) -> Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl FixtureHooks for NoHooks {}

/// Adapts a pair of closures into [`FixtureHooks`].
pub struct FnHooks<S, T> {
    set_up: S,
    tear_down: T,
}

impl<S, T> FnHooks<S, T>
where
    S: FnMut(&mut SelftestFixture) -> Result<()>,
    T: FnMut(&mut SelftestFixture) -> Result<()>,
{
    pub fn new(set_up: S, tear_down: T) -> Self {
        Self { set_up, tear_down }
    }
}

impl<S, T> FixtureHooks for FnHooks<S, T>
where
    S: FnMut(&mut SelftestFixture) -> Result<()>,
    T: FnMut(&mut SelftestFixture) -> Result<()>,
{
    fn set_up_local(&mut self, fixture: &mut SelftestFixture) -> Result<()> {
        (self.set_up)(fixture)
    }

    fn tear_down_local(&mut self, fixture: &mut SelftestFixture) -> Result<()> {
        (self.tear_down)(fixture)
    }
}
