//! The static graph of reconciliation steps.
//!
//! Each step declares the steps it depends on. A step may only attach a
//! `Requires` naming a task derived by one of its (transitive) dependencies,
//! and the loop runs steps in a topological order of this graph, so every
//! referenced task has been derived earlier in the same pass.
//!
//! ```text
//! Nodes ──► KubeadmConfig ──► InitCommand ──┬──► AdminConf ──► Networking
//!                                           ├──► Pki             ▲
//!                                           ├──► JoinToken       │
//!                                           └────────────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::LazyLock;

/// One provisioning step of the reconciliation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Step {
    /// Ensure a Node task exists for every member.
    Nodes,
    /// Record the kubeadm config and converge its ConfigFile task.
    KubeadmConfig,
    /// Ensure `kubeadm init` is requested on the bootstrap controller.
    InitCommand,
    /// Harvest `admin.conf`.
    AdminConf,
    /// Harvest the eight PKI artifacts.
    Pki,
    /// Parse join credentials out of the init output.
    JoinToken,
    /// Converge the pod network add-on command.
    Networking,
}

impl Step {
    /// Every step, in declaration order. Ties in the topological order are
    /// broken by this order.
    pub const ALL: [Step; 7] = [
        Step::Nodes,
        Step::KubeadmConfig,
        Step::InitCommand,
        Step::AdminConf,
        Step::Pki,
        Step::JoinToken,
        Step::Networking,
    ];

    /// Steps that must run before this one.
    pub fn depends_on(self) -> &'static [Step] {
        match self {
            Step::Nodes => &[],
            Step::KubeadmConfig => &[Step::Nodes],
            Step::InitCommand => &[Step::KubeadmConfig],
            Step::AdminConf | Step::Pki | Step::JoinToken => &[Step::InitCommand],
            Step::Networking => &[Step::InitCommand, Step::AdminConf],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Nodes => "nodes",
            Step::KubeadmConfig => "kubeadm_config",
            Step::InitCommand => "init_command",
            Step::AdminConf => "admin_conf",
            Step::Pki => "pki",
            Step::JoinToken => "join_token",
            Step::Networking => "networking",
        }
    }

    /// True if `other` is a direct or transitive dependency of this step.
    pub fn depends_transitively_on(self, other: Step) -> bool {
        self.depends_on()
            .iter()
            .any(|&dep| dep == other || dep.depends_transitively_on(other))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order in which the reconciliation loop visits steps.
pub static PIPELINE: LazyLock<Vec<Step>> = LazyLock::new(|| {
    topological_order(&Step::ALL, |step| step.depends_on())
        .unwrap_or_else(|cycle| panic!("reconciliation step graph has a cycle: {cycle:?}"))
});

/// Orders `nodes` so every node comes after its dependencies.
///
/// Among nodes whose dependencies are all satisfied, the one listed first in
/// `nodes` goes first, so the result is deterministic. Dependencies not in
/// `nodes` are ignored. On a cycle, returns the nodes that could not be
/// ordered.
pub fn topological_order<N, F>(nodes: &[N], deps: F) -> Result<Vec<N>, Vec<N>>
where
    N: Copy + Eq + Hash + 'static,
    F: Fn(N) -> &'static [N],
{
    let mut pending: HashMap<N, usize> = nodes
        .iter()
        .map(|&node| {
            let count = deps(node).iter().filter(|dep| nodes.contains(dep)).count();
            (node, count)
        })
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while order.len() < nodes.len() {
        let next = nodes
            .iter()
            .copied()
            .find(|node| !order.contains(node) && pending.get(node) == Some(&0));

        let Some(next) = next else {
            let stuck = nodes
                .iter()
                .copied()
                .filter(|node| !order.contains(node))
                .collect();
            return Err(stuck);
        };

        order.push(next);
        for &node in nodes {
            if deps(node).contains(&next)
                && let Some(count) = pending.get_mut(&node)
            {
                *count -= 1;
            }
        }
    }

    Ok(order)
}
