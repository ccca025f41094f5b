pub struct Observable<T> {
    value: T,
    version: u64,
    listeners: Vec<Box<dyn FnMut(&T)>>,
}

impl<T: PartialEq> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            version: 0,
            listeners: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.version = self.version.wrapping_add(1);
        for listener in &mut self.listeners {
            listener(&self.value);
        }
        true
    }

    /// Always stores `value`, but only bumps the version and notifies when it
    /// differs from the current one. For values whose equality deliberately
    /// ignores fast-changing fields that readers still want to see.
    pub fn replace(&mut self, value: T) -> bool {
        let changed = self.value != value;
        self.value = value;
        if changed {
            self.version = self.version.wrapping_add(1);
            for listener in &mut self.listeners {
                listener(&self.value);
            }
        }
        changed
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T) + 'static) {
        self.listeners.push(Box::new(listener));
    }
}

impl<T: PartialEq + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.value)
            .field("version", &self.version)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
