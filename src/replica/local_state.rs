use crate::replica::peers::ReplicaId;
use std::fmt;

/// Term is a raft election epoch. It only ever moves forward on a given replica.
#[derive(Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Default)]
pub struct Term(u64);

impl Term {
    pub fn new(term: u64) -> Self {
        Term(term)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn incr(&mut self) {
        self.0 += 1;
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// LocalState is the term/vote half of the state that the raft algorithm requires to be durable.
/// The caller is responsible for persisting after any method that reports a mutation, and
/// before the mutation becomes observable to anyone else.
///
/// Store methods are CAS-like: similar to most CAS method signatures, they return true if we
/// have mutated state.
pub(crate) struct LocalState {
    my_replica_id: ReplicaId,
    current_term: Term,
    voted_for_this_term: Option<ReplicaId>,
}

impl LocalState {
    pub(crate) fn new(my_replica_id: ReplicaId, current_term: Term, voted_for: Option<ReplicaId>) -> Self {
        LocalState {
            my_replica_id,
            current_term,
            voted_for_this_term: voted_for,
        }
    }

    /// Set current term to `new_term` iff it is larger than current term. Clears the vote.
    ///
    /// CAS: Return true if we successfully mutated state.
    pub(crate) fn store_term_if_increased(&mut self, new_term: Term) -> bool {
        if new_term <= self.current_term {
            return false;
        }

        self.set_term(new_term);
        true
    }

    /// Store our vote for the latest term iff the latest term is the same term as the one
    /// provided, and we have not stored a vote for the latest term.
    ///
    /// CAS: Return true if we successfully mutated state.
    pub(crate) fn store_vote_for_term_if_unvoted(&mut self, expected_term: Term, vote: ReplicaId) -> bool {
        if expected_term != self.current_term || self.voted_for_this_term.is_some() {
            return false;
        }

        self.voted_for_this_term.replace(vote);
        true
    }

    /// Return the new term. Used when transitioning to candidate.
    pub(crate) fn increment_term_and_vote_for_self(&mut self) -> Term {
        let mut new_term = self.current_term;
        new_term.incr();
        self.set_term(new_term);
        self.voted_for_this_term.replace(self.my_replica_id.clone());

        self.current_term
    }

    pub(crate) fn current_term(&self) -> Term {
        self.current_term
    }

    pub(crate) fn voted_for_current_term(&self) -> (Term, Option<&ReplicaId>) {
        (self.current_term, self.voted_for_this_term.as_ref())
    }

    fn set_term(&mut self, new_term: Term) {
        // Decreasing the term would void every vote and election guarantee. Nothing sane can
        // follow, so abort.
        assert!(
            new_term > self.current_term,
            "Term can only ratchet forward. Current={:?}, New={:?}",
            self.current_term,
            new_term
        );
        self.current_term = new_term;
        self.voted_for_this_term = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_state() -> LocalState {
        LocalState::new(ReplicaId::new("me"), Term::new(0), None)
    }

    #[test]
    fn term_increase_clears_vote() {
        let mut state = new_state();
        assert!(state.store_vote_for_term_if_unvoted(Term::new(0), ReplicaId::new("other")));

        assert!(state.store_term_if_increased(Term::new(3)));
        assert_eq!(state.voted_for_current_term(), (Term::new(3), None));

        assert!(!state.store_term_if_increased(Term::new(3)));
        assert!(!state.store_term_if_increased(Term::new(2)));
        assert_eq!(state.current_term(), Term::new(3));
    }

    #[test]
    fn vote_only_once_per_term() {
        let mut state = new_state();
        assert!(state.store_vote_for_term_if_unvoted(Term::new(0), ReplicaId::new("a")));
        assert!(!state.store_vote_for_term_if_unvoted(Term::new(0), ReplicaId::new("b")));
        // Wrong term
        assert!(!state.store_vote_for_term_if_unvoted(Term::new(1), ReplicaId::new("b")));

        let (term, voted_for) = state.voted_for_current_term();
        assert_eq!(term, Term::new(0));
        assert_eq!(voted_for, Some(&ReplicaId::new("a")));
    }

    #[test]
    fn candidate_votes_for_self() {
        let mut state = new_state();
        assert_eq!(state.increment_term_and_vote_for_self(), Term::new(1));
        assert_eq!(state.voted_for_current_term(), (Term::new(1), Some(&ReplicaId::new("me"))));
    }
}
