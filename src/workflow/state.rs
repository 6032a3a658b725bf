use crate::models::PipelineState;

/// Work performed while the cursor sits on a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    WriteInitialRecord,
    FanOutTransforms,
    MergeBranches,
    PatchRecord,
}

/// `{state -> (action, next state)}`; terminal states have no row.
pub const TRANSITIONS: &[(PipelineState, Action, PipelineState)] = &[
    (
        PipelineState::CreateRecord,
        Action::WriteInitialRecord,
        PipelineState::ParallelTransform,
    ),
    (
        PipelineState::ParallelTransform,
        Action::FanOutTransforms,
        PipelineState::MergeResults,
    ),
    (
        PipelineState::MergeResults,
        Action::MergeBranches,
        PipelineState::UpdateRecord,
    ),
    (
        PipelineState::UpdateRecord,
        Action::PatchRecord,
        PipelineState::Succeeded,
    ),
];

pub fn transition(state: PipelineState) -> Option<(Action, PipelineState)> {
    TRANSITIONS
        .iter()
        .find(|(from, _, _)| *from == state)
        .map(|(_, action, next)| (*action, *next))
}
