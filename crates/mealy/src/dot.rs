use std::fmt::Write;

use crate::machine::MealyMachine;

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

impl MealyMachine {
    /// Renders the reachable part of the machine as Graphviz DOT.
    ///
    /// States appear in BFS order from the initial state and transitions in
    /// alphabet order, so the output is byte-identical across runs for the
    /// same machine.
    pub fn dot_representation(&self) -> String {
        let mut dot = String::from("digraph {\n  rankdir=LR;\n");
        if let Some(initial) = self.state_name(self.initial()) {
            let _ = writeln!(dot, "  \"{}\" [shape=doublecircle];", escape(initial));
        }
        for source in self.reachable_states() {
            for transition in self.transitions_from(source) {
                let _ = writeln!(
                    dot,
                    "  \"{}\" -> \"{}\" [label=\"{}/{}\"];",
                    escape(self.state_name(source).unwrap_or_default()),
                    escape(self.state_name(transition.target).unwrap_or_default()),
                    transition.input,
                    transition.output,
                );
            }
        }
        dot.push_str("}\n");
        dot
    }
}
