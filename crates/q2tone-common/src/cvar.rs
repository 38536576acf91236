// cvar.rs — dynamic variable tracking

use crate::common::com_printf;
use crate::q_shared::{CVAR_ARCHIVE, CVAR_FILES, CVAR_NOSET, CVAR_REFRESH, CVAR_ROM};

use std::collections::HashMap;

/// A console variable.
#[derive(Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    /// Value the cvar was created with; restored by `reset`.
    pub default_string: String,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
    pub integer: i32,
}

impl Cvar {
    fn assign(&mut self, value: &str) {
        self.string = value.to_string();
        self.value = value.parse::<f32>().unwrap_or(0.0);
        self.integer = value.parse::<i32>().unwrap_or(self.value as i32);
    }
}

/// The full cvar system context.
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
    /// Accumulated `CVAR_REFRESH` / `CVAR_FILES` bits of every cvar changed
    /// since the owner last drained them.
    pub cvar_modified: i32,
}

impl CvarContext {
    pub fn new() -> Self {
        Self {
            cvar_vars: Vec::new(),
            cvar_index: HashMap::new(),
            cvar_modified: 0,
        }
    }

    /// Find a cvar by name, returning its index. O(1) via HashMap.
    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(name).copied()
    }

    /// Find a cvar by name. O(1) via HashMap.
    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Find a cvar by name (mutable). O(1) via HashMap.
    pub fn find_var_mut(&mut self, name: &str) -> Option<&mut Cvar> {
        if let Some(&idx) = self.cvar_index.get(name) {
            Some(&mut self.cvar_vars[idx])
        } else {
            None
        }
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        match self.find_var(name) {
            Some(var) => var.value,
            None => 0.0,
        }
    }

    /// Get the integer value of a cvar. Returns 0 if not found.
    pub fn variable_integer(&self, name: &str) -> i32 {
        match self.find_var(name) {
            Some(var) => var.integer,
            None => 0,
        }
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        match self.find_var(name) {
            Some(var) => &var.string,
            None => "",
        }
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in. O(1) lookup via HashMap.
    pub fn get(&mut self, name: &str, value: Option<&str>, flags: i32) -> Option<usize> {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return Some(idx);
        }

        let value = value?;

        let idx = self.cvar_vars.len();
        let mut var = Cvar {
            name: name.to_string(),
            string: String::new(),
            default_string: value.to_string(),
            flags,
            modified: true,
            value: 0.0,
            integer: 0,
        };
        var.assign(value);
        self.cvar_vars.push(var);
        self.cvar_index.insert(name.to_string(), idx);

        Some(idx)
    }

    /// Convenience: get or create a cvar, returning its index.
    pub fn get_or_create(&mut self, name: &str, value: &str, flags: i32) -> usize {
        match self.get(name, Some(value), flags) {
            Some(idx) => idx,
            // get() only refuses when no value is supplied
            None => unreachable!("cvar creation with a value cannot fail"),
        }
    }

    /// Internal set implementation.
    fn set2(&mut self, name: &str, value: &str, force: bool, mark_modified: bool) -> Option<usize> {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, Some(value), 0),
        };

        if !force && self.cvar_vars[idx].flags & (CVAR_NOSET | CVAR_ROM) != 0 {
            com_printf(&format!("{} is write protected.\n", name));
            return Some(idx);
        }

        if value == self.cvar_vars[idx].string {
            return Some(idx); // not changed
        }

        self.cvar_vars[idx].assign(value);

        if mark_modified {
            self.cvar_vars[idx].modified = true;
            self.cvar_modified |= self.cvar_vars[idx].flags & (CVAR_REFRESH | CVAR_FILES);
        }

        Some(idx)
    }

    /// Set a cvar value (respects NOSET and ROM flags).
    pub fn set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, false, true)
    }

    /// Force-set a cvar value (ignores NOSET and ROM).
    pub fn force_set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, true, true)
    }

    /// Store a value produced by the engine itself (e.g. the window was
    /// moved by the user). The cvar is not marked modified, so no change
    /// reaction is triggered.
    pub fn set_from_code(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, true, false)
    }

    /// Set a cvar from a float value.
    pub fn set_value(&mut self, name: &str, value: f32) {
        let val_str = if value == (value as i32) as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &val_str);
    }

    /// Restore a cvar to the value it was created with.
    pub fn reset(&mut self, name: &str) {
        let default = match self.find_var(name) {
            Some(var) => var.default_string.clone(),
            None => return,
        };
        self.force_set(name, &default);
    }

    /// Clamp a cvar into [min, max], writing the clamped value back if it
    /// was out of range. Returns the clamped value.
    pub fn clamp_value(&mut self, name: &str, min: f32, max: f32) -> f32 {
        let value = self.variable_value(name);
        if value < min {
            self.set_value(name, min);
            return min;
        }
        if value > max {
            self.set_value(name, max);
            return max;
        }
        value
    }

    /// Return and clear the modified flag of a cvar.
    pub fn take_modified(&mut self, name: &str) -> bool {
        match self.find_var_mut(name) {
            Some(var) => std::mem::replace(&mut var.modified, false),
            None => false,
        }
    }

    /// Handle variable inspection/changing from the console.
    /// Returns true if the command was a cvar reference.
    pub fn command(&mut self, argv0: &str, argc: usize, argv1: Option<&str>) -> bool {
        let idx = match self.find_var_index(argv0) {
            Some(idx) => idx,
            None => return false,
        };

        if argc == 1 {
            com_printf(&format!(
                "\"{}\" is \"{}\"\n",
                self.cvar_vars[idx].name, self.cvar_vars[idx].string
            ));
            return true;
        }

        if let Some(value) = argv1 {
            let name = self.cvar_vars[idx].name.clone();
            self.set(&name, value);
        }
        true
    }

    /// Write all archived cvars to a writer.
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in &self.cvar_vars {
            if var.flags & CVAR_ARCHIVE != 0 {
                writeln!(writer, "set {} \"{}\"", var.name, var.string)?;
            }
        }
        Ok(())
    }
}

impl Default for CvarContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Tests
// ============================================================
