//! Process-wide singleton state: `DynamicGlobalProperties`, median chain
//! properties, the producer schedule, reward funds. Spec §9: "expose them as
//! named handles on the transactional store, not as implicit globals."
enum Patch<V> {
    Overwritten(V),
}

pub struct Singleton<V> {
    value: V,
    scopes: Vec<Vec<Patch<V>>>,
}

impl<V: Clone> Singleton<V> {
    pub fn new(value: V) -> Self {
        Singleton { value, scopes: Vec::new() }
    }

    pub fn get(&self) -> &V {
        &self.value
    }

    pub fn modify(&mut self, f: impl FnOnce(&mut V)) {
        let before = self.value.clone();
        f(&mut self.value);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(Patch::Overwritten(before));
        }
    }

    pub fn begin_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn commit_scope(&mut self) {
        let patches = self.scopes.pop().expect("commit_scope with no open scope");
        if let Some(parent) = self.scopes.last_mut() {
            parent.extend(patches);
        }
    }

    pub fn abort_scope(&mut self) {
        let patches = self.scopes.pop().expect("abort_scope with no open scope");
        for patch in patches.into_iter().rev() {
            match patch {
                Patch::Overwritten(old) => self.value = old,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_restores_previous_value() {
        let mut s = Singleton::new(1u64);
        s.begin_scope();
        s.modify(|v| *v = 2);
        s.modify(|v| *v = 3);
        assert_eq!(*s.get(), 3);
        s.abort_scope();
        assert_eq!(*s.get(), 1);
    }
}
