//! Approval checkpoint ahead of script execution.

use crate::core::types::ExtractedScript;

/// Source of a synchronous yes/no answer for a proposed script.
pub trait Confirmer {
    /// Return `true` to allow `script` to run.
    fn confirm(&mut self, script: &ExtractedScript) -> bool;
}

/// Confirmation state for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    AutoApproved,
    PendingUserDecision,
    Approved,
    Rejected,
}

impl GateState {
    pub fn initial(confirm_script: bool) -> Self {
        if confirm_script {
            GateState::PendingUserDecision
        } else {
            GateState::AutoApproved
        }
    }

    /// Advance to a final state. Only `PendingUserDecision` consults the
    /// confirmer; final states are returned unchanged.
    pub fn resolve<C: Confirmer + ?Sized>(
        self,
        script: &ExtractedScript,
        confirmer: &mut C,
    ) -> GateState {
        match self {
            GateState::AutoApproved => GateState::Approved,
            GateState::PendingUserDecision => {
                if confirmer.confirm(script) {
                    GateState::Approved
                } else {
                    GateState::Rejected
                }
            }
            done => done,
        }
    }
}

/// Gate configured once per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationGate {
    confirm_script: bool,
}

impl ConfirmationGate {
    pub fn new(confirm_script: bool) -> Self {
        Self { confirm_script }
    }

    pub fn requires_confirmation(&self) -> bool {
        self.confirm_script
    }

    /// Run the gate to a final `Approved` or `Rejected` state.
    pub fn decide<C: Confirmer + ?Sized>(
        &self,
        script: &ExtractedScript,
        confirmer: &mut C,
    ) -> GateState {
        GateState::initial(self.confirm_script).resolve(script, confirmer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        answer: bool,
        asked: u32,
    }

    impl Confirmer for Fixed {
        fn confirm(&mut self, _script: &ExtractedScript) -> bool {
            self.asked += 1;
            self.answer
        }
    }

    fn script() -> ExtractedScript {
        ExtractedScript {
            language_tag: "sh".to_string(),
            body: "echo hi".to_string(),
        }
    }

    #[test]
    fn auto_approves_without_asking() {
        let mut confirmer = Fixed {
            answer: false,
            asked: 0,
        };
        let gate = ConfirmationGate::new(false);
        assert_eq!(gate.decide(&script(), &mut confirmer), GateState::Approved);
        assert_eq!(confirmer.asked, 0);
    }

    #[test]
    fn pending_decision_follows_answer() {
        let gate = ConfirmationGate::new(true);
        let mut yes = Fixed {
            answer: true,
            asked: 0,
        };
        let mut no = Fixed {
            answer: false,
            asked: 0,
        };
        assert_eq!(gate.decide(&script(), &mut yes), GateState::Approved);
        assert_eq!(gate.decide(&script(), &mut no), GateState::Rejected);
        assert_eq!(yes.asked, 1);
        assert_eq!(no.asked, 1);
    }

    #[test]
    fn final_states_are_stable() {
        let mut confirmer = Fixed {
            answer: true,
            asked: 0,
        };
        assert_eq!(
            GateState::Rejected.resolve(&script(), &mut confirmer),
            GateState::Rejected
        );
        assert_eq!(
            GateState::Approved.resolve(&script(), &mut confirmer),
            GateState::Approved
        );
        assert_eq!(confirmer.asked, 0);
    }
}
