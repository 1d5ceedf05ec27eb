/// Topology lifecycle state.
///
/// `Destroyed` is absorbing; `Unreferenced` can only move to `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyState {
    Disconnected,
    Connecting,
    Connected,
    Unreferenced,
    Destroyed,
}

impl TopologyState {
    /// States a topology in this state may move to.
    fn legal_transitions(self) -> &'static [TopologyState] {
        use TopologyState::*;
        match self {
            Disconnected => &[Connecting, Destroyed, Disconnected],
            Connecting => &[Connecting, Destroyed, Connected, Disconnected],
            Connected => &[Connected, Disconnected, Destroyed, Unreferenced],
            Unreferenced => &[Unreferenced, Destroyed],
            Destroyed => &[Destroyed],
        }
    }

    /// Applies a transition. Illegal transitions leave the state unchanged
    /// and return `false`; they are never an error.
    pub fn transition(&mut self, to: TopologyState) -> bool {
        if self.legal_transitions().contains(&to) {
            *self = to;
            true
        } else {
            false
        }
    }

    /// Terminal states discard late callback results instead of mutating
    /// the proxy sets.
    pub fn is_terminal(self) -> bool {
        matches!(self, TopologyState::Destroyed | TopologyState::Unreferenced)
    }
}

#[cfg(test)]
mod tests {
    use super::TopologyState::*;

    #[test]
    fn test_initial_connect_path() {
        let mut state = Disconnected;
        assert!(state.transition(Connecting));
        assert!(state.transition(Connected));
        assert_eq!(state, Connected);
    }

    #[test]
    fn test_destroyed_is_absorbing() {
        let mut state = Destroyed;
        for target in [Disconnected, Connecting, Connected, Unreferenced] {
            assert!(!state.transition(target));
            assert_eq!(state, Destroyed);
        }
        assert!(state.transition(Destroyed));
    }

    #[test]
    fn test_illegal_transition_is_silent_noop() {
        let mut state = Disconnected;
        assert!(!state.transition(Connected));
        assert_eq!(state, Disconnected);

        let mut state = Unreferenced;
        assert!(!state.transition(Connecting));
        assert_eq!(state, Unreferenced);
    }

    #[test]
    fn test_every_state_reaches_destroyed() {
        for start in [Disconnected, Connecting, Connected, Unreferenced, Destroyed] {
            let mut state = start;
            assert!(state.transition(Destroyed));
            assert_eq!(state, Destroyed);
        }
    }

    #[test]
    fn test_connected_can_drop_back_to_disconnected() {
        let mut state = Connected;
        assert!(state.transition(Disconnected));
        assert!(state.transition(Connecting));
    }

    #[test]
    fn test_terminal_states() {
        assert!(Destroyed.is_terminal());
        assert!(Unreferenced.is_terminal());
        assert!(!Connected.is_terminal());
        assert!(!Connecting.is_terminal());
        assert!(!Disconnected.is_terminal());
    }
}
