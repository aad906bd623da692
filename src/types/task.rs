//! Declarative units of remote work consumed by the task executor.
//!
//! The operator only ever writes the declarative half of a task (target node,
//! path or command, content, `Requires`). The executor performs the remote
//! action and writes the result half back onto the same object.

use serde::{Deserialize, Serialize};

use super::ids::{Kind, ObjectKey};
use super::meta::ObjectMeta;

/// Port used to reach every node.
pub const SSH_PORT: u16 = 22;

/// A task object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub metadata: ObjectMeta,
    pub spec: TaskSpec,
}

impl Task {
    pub fn new(metadata: ObjectMeta, spec: impl Into<TaskSpec>) -> Self {
        Task {
            metadata,
            spec: spec.into(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.spec.kind()
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Whether the executor has reported completion.
    ///
    /// Node and ConfigFile tasks carry no result record and never report done.
    pub fn is_done(&self) -> bool {
        match &self.spec {
            TaskSpec::Command(command) => command.result.done,
            TaskSpec::FactFile(fact) => fact.result.done,
            TaskSpec::Node(_) | TaskSpec::ConfigFile(_) => false,
        }
    }

    /// Applies an executor result to a Command or FactFile task.
    ///
    /// Returns `false` (leaving the task untouched) for kinds without a result.
    pub fn record_result(&mut self, result: TaskResult) -> bool {
        match &mut self.spec {
            TaskSpec::Command(command) => {
                command.result = result;
                true
            }
            TaskSpec::FactFile(fact) => {
                fact.result = result;
                true
            }
            TaskSpec::Node(_) | TaskSpec::ConfigFile(_) => false,
        }
    }

    /// Returns this task's `Requires`, if it has one.
    pub fn requires(&self) -> Option<&Requires> {
        match &self.spec {
            TaskSpec::Node(_) => None,
            TaskSpec::ConfigFile(file) => file.requires.as_ref(),
            TaskSpec::Command(command) => command.requires.as_ref(),
            TaskSpec::FactFile(fact) => fact.requires.as_ref(),
        }
    }
}

/// The declarative content of a task, one case per task kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSpec {
    Node(NodeSpec),
    ConfigFile(ConfigFileSpec),
    Command(CommandSpec),
    FactFile(FactFileSpec),
}

impl TaskSpec {
    pub fn kind(&self) -> Kind {
        match self {
            TaskSpec::Node(_) => Kind::Node,
            TaskSpec::ConfigFile(_) => Kind::ConfigFile,
            TaskSpec::Command(_) => Kind::Command,
            TaskSpec::FactFile(_) => Kind::FactFile,
        }
    }

    /// The operator-owned half of the spec, with any result record cleared.
    pub fn declarative(&self) -> TaskSpec {
        let mut spec = self.clone();
        match &mut spec {
            TaskSpec::Command(command) => command.result = TaskResult::default(),
            TaskSpec::FactFile(fact) => fact.result = TaskResult::default(),
            TaskSpec::Node(_) | TaskSpec::ConfigFile(_) => {}
        }
        spec
    }
}

/// "This node must be known to the executor."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub address: String,
    pub port: u16,
    pub ssh_key_secret: String,
}

/// "This exact content must exist at this path on this node."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFileSpec {
    pub host: String,
    pub path: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requires>,
}

/// "This exact command line must be run on this node."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub host: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requires>,
    #[serde(default)]
    pub result: TaskResult,
}

/// "Capture the content of this path on this node once it is available."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactFileSpec {
    pub host: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requires>,
    #[serde(default)]
    pub result: TaskResult,
}

/// Completion record written by the executor.
///
/// `output` is the command's standard output for Command tasks and the
/// captured file content for FactFile tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub done: bool,
    #[serde(default)]
    pub output: String,
}

impl TaskResult {
    pub fn done(output: impl Into<String>) -> Self {
        TaskResult {
            done: true,
            output: output.into(),
        }
    }
}

/// A dependency predicate: the task is not satisfied until the named task has
/// completed. Enforced by the executor, never by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requires {
    Command(String),
    ConfigFile(String),
    FactFile(String),
}

impl Requires {
    /// Kind of the referenced task.
    pub fn kind(&self) -> Kind {
        match self {
            Requires::Command(_) => Kind::Command,
            Requires::ConfigFile(_) => Kind::ConfigFile,
            Requires::FactFile(_) => Kind::FactFile,
        }
    }

    /// Name of the referenced task.
    pub fn name(&self) -> &str {
        match self {
            Requires::Command(name) | Requires::ConfigFile(name) | Requires::FactFile(name) => {
                name
            }
        }
    }
}

impl From<NodeSpec> for TaskSpec {
    fn from(spec: NodeSpec) -> Self {
        TaskSpec::Node(spec)
    }
}

impl From<ConfigFileSpec> for TaskSpec {
    fn from(spec: ConfigFileSpec) -> Self {
        TaskSpec::ConfigFile(spec)
    }
}

impl From<CommandSpec> for TaskSpec {
    fn from(spec: CommandSpec) -> Self {
        TaskSpec::Command(spec)
    }
}

impl From<FactFileSpec> for TaskSpec {
    fn from(spec: FactFileSpec) -> Self {
        TaskSpec::FactFile(spec)
    }
}
