use serde::Serialize;

use crate::params::DeterrenceRule;

/// A member of the population
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    id: usize,
    wealth: f64,
    has_offended: bool,
}

/// Read-only view of an agent handed to data collectors
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgentRecord {
    pub id: usize,
    pub has_offended: bool,
    pub wealth: f64,
}

impl Agent {
    pub fn new(id: usize, wealth: f64) -> Self {
        Agent {
            id,
            wealth,
            has_offended: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn wealth(&self) -> f64 {
        self.wealth
    }

    /// Once set, never cleared
    pub fn has_offended(&self) -> bool {
        self.has_offended
    }

    /// Whether this agent acts against `peer` this step
    ///
    /// Offenders are retired and never act again.
    pub fn would_offend(&self, peer: &Agent, rule: DeterrenceRule, deterrence: f64) -> bool {
        !self.has_offended && rule.permits(self.wealth, peer.wealth, deterrence)
    }

    pub fn record(&self) -> AgentRecord {
        AgentRecord {
            id: self.id,
            has_offended: self.has_offended,
            wealth: self.wealth,
        }
    }
}

/// Move `fraction` of the victim's wealth to the thief and mark the thief
///
/// Returns the amount taken. `fraction` is expected in `[0, 1]`. Self-theft
/// marks the agent but leaves its wealth untouched.
pub(crate) fn commit_theft(agents: &mut [Agent], thief: usize, victim: usize, fraction: f64) -> f64 {
    let stolen = fraction * agents[victim].wealth;
    agents[thief].has_offended = true;
    if thief != victim {
        agents[thief].wealth += stolen;
        agents[victim].wealth -= stolen;
    }
    stolen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agent_is_law_abiding() {
        let agent = Agent::new(3, 0.4);
        assert_eq!(agent.id(), 3);
        assert_eq!(agent.wealth(), 0.4);
        assert!(!agent.has_offended());
    }

    #[test]
    fn offenders_never_act_again() {
        let mut agents = vec![Agent::new(0, 0.1), Agent::new(1, 0.9)];
        assert!(agents[0].would_offend(&agents[1], DeterrenceRule::Absolute, 0.0));

        commit_theft(&mut agents, 0, 1, 0.1);

        assert!(agents[0].has_offended());
        assert!(!agents[0].would_offend(&agents[1], DeterrenceRule::Absolute, 0.0));
    }

    #[test]
    fn theft_is_zero_sum() {
        let mut agents = vec![Agent::new(0, 0.1), Agent::new(1, 0.2)];
        let stolen = commit_theft(&mut agents, 0, 1, 0.5);

        assert!((stolen - 0.1).abs() < 1e-12);
        assert!((agents[0].wealth() - 0.2).abs() < 1e-12);
        assert!((agents[1].wealth() - 0.1).abs() < 1e-12);
        assert!(!agents[1].has_offended());
    }

    #[test]
    fn full_theft_leaves_victim_at_zero() {
        let mut agents = vec![Agent::new(0, 0.0), Agent::new(1, 0.7)];
        commit_theft(&mut agents, 0, 1, 1.0);
        assert_eq!(agents[1].wealth(), 0.0);
        assert_eq!(agents[0].wealth(), 0.7);
    }

    #[test]
    fn self_theft_only_sets_flag() {
        let mut agents = vec![Agent::new(0, 0.5)];
        commit_theft(&mut agents, 0, 0, 0.5);
        assert!(agents[0].has_offended());
        assert_eq!(agents[0].wealth(), 0.5);
    }
}
