//! Node types that participate in the build graph.

use indexmap::IndexMap;

/// Identifies one output of a node.
///
/// Symbolic outputs have no backing file; they exist purely so other nodes
/// can depend on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId {
    /// Output path or symbolic name.
    pub path: String,
    /// Whether the output is symbolic rather than a file.
    pub symbolic: bool,
}

impl OutputId {
    /// A file-backed output.
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            symbolic: false,
        }
    }

    /// A symbolic output.
    #[must_use]
    pub fn symbolic(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            symbolic: true,
        }
    }
}

/// Uniform view over anything the sorter can order.
pub trait GraphNode {
    /// Unique name of the node within one sort.
    fn name(&self) -> &str;
    /// Outputs produced by the node.
    fn outputs(&self) -> &[OutputId];
    /// Inputs consumed by the node: output paths of other nodes, or external
    /// files.
    fn inputs(&self) -> &[String];
}

impl<N: GraphNode + ?Sized> GraphNode for &N {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn outputs(&self) -> &[OutputId] {
        (**self).outputs()
    }

    fn inputs(&self) -> &[String] {
        (**self).inputs()
    }
}

/// A declared target.
///
/// A target produces one symbolic output named after itself and consumes the
/// targets it depends on together with the outputs of the commands it hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNode {
    name: String,
    depends: Vec<String>,
    commands: Vec<String>,
    command_outputs: Vec<String>,
    imported: bool,
    exclude_from_all: bool,
    outputs: Vec<OutputId>,
    inputs: Vec<String>,
}

impl TargetNode {
    /// Create a target with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            outputs: vec![OutputId::symbolic(name.clone())],
            name,
            depends: Vec::new(),
            commands: Vec::new(),
            command_outputs: Vec::new(),
            imported: false,
            exclude_from_all: false,
            inputs: Vec::new(),
        }
    }

    /// Set the targets this target depends on.
    #[must_use]
    pub fn with_depends(mut self, depends: Vec<String>) -> Self {
        self.depends = depends;
        self.refresh_inputs();
        self
    }

    /// Attach hosted commands; their outputs become inputs of the target.
    #[must_use]
    pub fn with_commands<'a>(mut self, commands: impl IntoIterator<Item = &'a CommandNode>) -> Self {
        self.commands.clear();
        self.command_outputs.clear();
        for command in commands {
            self.commands.push(command.name().to_owned());
            self.command_outputs
                .extend(command.outputs().iter().map(|out| out.path.clone()));
        }
        self.refresh_inputs();
        self
    }

    /// Mark the target as a prebuilt artefact whose identity does not depend
    /// on the active configuration.
    #[must_use]
    pub const fn imported(mut self, imported: bool) -> Self {
        self.imported = imported;
        self
    }

    /// Leave the target out of the per-configuration `all` aliases.
    #[must_use]
    pub const fn exclude_from_all(mut self, exclude: bool) -> Self {
        self.exclude_from_all = exclude;
        self
    }

    fn refresh_inputs(&mut self) {
        self.inputs = self
            .depends
            .iter()
            .chain(&self.command_outputs)
            .cloned()
            .collect();
    }

    /// Targets this target depends on.
    #[must_use]
    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    /// Names of the commands hosted by this target.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Whether the target is imported.
    #[must_use]
    pub const fn is_imported(&self) -> bool {
        self.imported
    }

    /// Whether the target is excluded from the `all` aliases.
    #[must_use]
    pub const fn is_excluded_from_all(&self) -> bool {
        self.exclude_from_all
    }
}

impl GraphNode for TargetNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn outputs(&self) -> &[OutputId] {
        &self.outputs
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }
}

/// Per-configuration replacement for parts of a command declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverride {
    /// Replacement command lines.
    pub command_lines: Option<Vec<String>>,
    /// Replacement working directory.
    pub working_directory: Option<String>,
}

/// A custom command declaration, before materialization.
///
/// Strings may contain the configuration placeholder token; it is expanded
/// per configuration by [`crate::variance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandNode {
    name: String,
    command_lines: Vec<String>,
    working_directory: Option<String>,
    inputs: Vec<String>,
    file_outputs: Vec<String>,
    byproducts: Vec<String>,
    symbolic_outputs: Vec<String>,
    depends: Vec<String>,
    overrides: IndexMap<String, ConfigOverride>,
    graph_outputs: Vec<OutputId>,
    graph_inputs: Vec<String>,
}

impl CommandNode {
    /// Create a command running `command_lines` in order.
    #[must_use]
    pub fn new(name: impl Into<String>, command_lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command_lines,
            working_directory: None,
            inputs: Vec::new(),
            file_outputs: Vec::new(),
            byproducts: Vec::new(),
            symbolic_outputs: Vec::new(),
            depends: Vec::new(),
            overrides: IndexMap::new(),
            graph_outputs: Vec::new(),
            graph_inputs: Vec::new(),
        }
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_directory(mut self, dir: Option<String>) -> Self {
        self.working_directory = dir;
        self
    }

    /// Set the consumed files or outputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Vec<String>) -> Self {
        self.inputs = inputs;
        self.refresh_graph();
        self
    }

    /// Set the primary file outputs.
    #[must_use]
    pub fn with_outputs(mut self, outputs: Vec<String>) -> Self {
        self.file_outputs = outputs;
        self.refresh_graph();
        self
    }

    /// Set secondary file outputs.
    #[must_use]
    pub fn with_byproducts(mut self, byproducts: Vec<String>) -> Self {
        self.byproducts = byproducts;
        self.refresh_graph();
        self
    }

    /// Set outputs that never exist on disk.
    #[must_use]
    pub fn with_symbolic_outputs(mut self, outputs: Vec<String>) -> Self {
        self.symbolic_outputs = outputs;
        self.refresh_graph();
        self
    }

    /// Set the targets that must be built before this command runs.
    #[must_use]
    pub fn with_depends(mut self, depends: Vec<String>) -> Self {
        self.depends = depends;
        self.refresh_graph();
        self
    }

    /// Override parts of the command for one configuration.
    #[must_use]
    pub fn with_override(mut self, configuration: impl Into<String>, o: ConfigOverride) -> Self {
        self.overrides.insert(configuration.into(), o);
        self
    }

    fn refresh_graph(&mut self) {
        self.graph_outputs = self
            .file_outputs
            .iter()
            .chain(&self.byproducts)
            .map(OutputId::file)
            .chain(self.symbolic_outputs.iter().map(OutputId::symbolic))
            .collect();
        self.graph_inputs = self.inputs.iter().chain(&self.depends).cloned().collect();
    }

    /// Raw command lines.
    #[must_use]
    pub fn command_lines(&self) -> &[String] {
        &self.command_lines
    }

    /// Raw working directory.
    #[must_use]
    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    /// Raw inputs, excluding target dependencies.
    #[must_use]
    pub fn raw_inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Raw primary file outputs.
    #[must_use]
    pub fn file_outputs(&self) -> &[String] {
        &self.file_outputs
    }

    /// Raw byproducts.
    #[must_use]
    pub fn byproducts(&self) -> &[String] {
        &self.byproducts
    }

    /// Raw symbolic outputs.
    #[must_use]
    pub fn symbolic_outputs(&self) -> &[String] {
        &self.symbolic_outputs
    }

    /// Targets this command depends on.
    #[must_use]
    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    /// Per-configuration overrides, in declaration order.
    #[must_use]
    pub const fn overrides(&self) -> &IndexMap<String, ConfigOverride> {
        &self.overrides
    }

    /// Override declared for `configuration`, if any.
    #[must_use]
    pub fn override_for(&self, configuration: &str) -> Option<&ConfigOverride> {
        self.overrides.get(configuration)
    }
}

impl GraphNode for CommandNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn outputs(&self) -> &[OutputId] {
        &self.graph_outputs
    }

    fn inputs(&self) -> &[String] {
        &self.graph_inputs
    }
}

/// Closed set of node kinds handled by one generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A target grouping commands and other targets.
    Target(TargetNode),
    /// A custom command.
    Command(CommandNode),
}

impl Node {
    /// Short label for the node kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Target(_) => "target",
            Self::Command(_) => "command",
        }
    }
}

impl GraphNode for Node {
    fn name(&self) -> &str {
        match self {
            Self::Target(t) => t.name(),
            Self::Command(c) => c.name(),
        }
    }

    fn outputs(&self) -> &[OutputId] {
        match self {
            Self::Target(t) => t.outputs(),
            Self::Command(c) => c.outputs(),
        }
    }

    fn inputs(&self) -> &[String] {
        match self {
            Self::Target(t) => t.inputs(),
            Self::Command(c) => c.inputs(),
        }
    }
}
