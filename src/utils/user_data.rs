use std::any::Any;

/// Arbitrary application data attached to a body, fixture or joint.
///
/// Any `'static + Send + Sync` type qualifies. Retrieve it back with
/// [`downcast_ref`](#method.downcast_ref) or [`downcast_mut`](#method.downcast_mut).
pub trait UserData: Any + Send + Sync {
    #[doc(hidden)]
    fn as_any_ref(&self) -> &dyn Any;
    #[doc(hidden)]
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Send + Sync> UserData for T {
    fn as_any_ref(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn UserData {
    /// The attached data if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any_ref().downcast_ref()
    }

    /// Mutable access to the attached data if it is a `T`.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    /// Whether the attached data is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.as_any_ref().is::<T>()
    }
}

#[cfg(test)]
mod test {
    use super::UserData;

    #[test]
    fn downcast_recovers_the_attached_type() {
        let mut data: Box<dyn UserData> = Box::new(String::from("crate"));
        assert!(data.is::<String>());
        assert!(data.downcast_ref::<u32>().is_none());

        data.downcast_mut::<String>().unwrap().push_str("s");
        assert_eq!(data.downcast_ref::<String>().map(|s| s.as_str()), Some("crates"));
    }
}
