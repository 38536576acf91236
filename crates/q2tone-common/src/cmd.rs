// cmd.rs — console command registration and dispatch
//
// Commands are plain function pointers over an owner type `T`, so a
// subsystem registers handlers that operate on its own state instead of
// reaching for globals.

use crate::common::com_printf;

use std::collections::HashMap;

/// A registered command.
pub struct CmdFunction<T> {
    pub name: String,
    pub function: fn(&mut T),
}

/// The command registry for one owner type.
pub struct CmdContext<T> {
    pub cmd_functions: Vec<CmdFunction<T>>,
    /// O(1) command lookup by name (lowercase) -> index in cmd_functions
    cmd_functions_index: HashMap<String, usize>,
}

impl<T> CmdContext<T> {
    pub fn new() -> Self {
        Self {
            cmd_functions: Vec::new(),
            cmd_functions_index: HashMap::new(),
        }
    }

    // ========================================================
    // Command registration
    // ========================================================

    /// Register a new command. O(1) lookup via HashMap.
    pub fn cmd_add_command(&mut self, name: &str, function: fn(&mut T)) {
        let key = name.to_ascii_lowercase();

        if self.cmd_functions_index.contains_key(&key) {
            com_printf(&format!("Cmd_AddCommand: {} already defined\n", name));
            return;
        }

        let idx = self.cmd_functions.len();
        self.cmd_functions.push(CmdFunction {
            name: name.to_string(),
            function,
        });
        self.cmd_functions_index.insert(key, idx);
    }

    /// Remove a command by name. O(1) lookup via HashMap.
    pub fn cmd_remove_command(&mut self, name: &str) {
        let key = name.to_ascii_lowercase();

        if let Some(idx) = self.cmd_functions_index.remove(&key) {
            self.cmd_functions.remove(idx);

            // Update indices for all commands after the removed one
            for v in self.cmd_functions_index.values_mut() {
                if *v > idx {
                    *v -= 1;
                }
            }
        } else {
            com_printf(&format!("Cmd_RemoveCommand: {} not added\n", name));
        }
    }

    /// Check if a command exists. O(1) lookup via HashMap.
    pub fn cmd_exists(&self, name: &str) -> bool {
        self.cmd_functions_index.contains_key(&name.to_ascii_lowercase())
    }

    /// Look up the handler for a command name.
    pub fn cmd_find(&self, name: &str) -> Option<fn(&mut T)> {
        self.cmd_functions_index
            .get(&name.to_ascii_lowercase())
            .map(|&idx| self.cmd_functions[idx].function)
    }

    // ========================================================
    // Execution
    // ========================================================

    /// Execute the first whitespace-separated token of `text` as a command
    /// against `owner`. Returns false if no such command is registered.
    pub fn cmd_execute_string(&self, text: &str, owner: &mut T) -> bool {
        let name = match text.split_whitespace().next() {
            Some(name) => name,
            None => return false,
        };

        match self.cmd_find(name) {
            Some(function) => {
                function(owner);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for CmdContext<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Tests
// ============================================================
