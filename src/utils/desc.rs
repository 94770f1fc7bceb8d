// Builder accessors for the `*Desc` structures.

macro_rules! desc_setters(
    ($($with_method: ident, $set_method: ident, $arg: ident: $t: ty)*) => {
        $(
            #[allow(missing_docs)]
            #[inline]
            pub fn $with_method(mut self, $arg: $t) -> Self {
                self.$arg = $arg;
                self
            }

            #[allow(missing_docs)]
            #[inline]
            pub fn $set_method(&mut self, $arg: $t) -> &mut Self {
                self.$arg = $arg;
                self
            }
        )*
    }
);

macro_rules! desc_getters(
    ($($get_method: ident -> $arg: ident: $t: ty)*) => {
        $(
            #[allow(missing_docs)]
            #[inline]
            pub fn $get_method(&self) -> $t {
                self.$arg
            }
        )*
    }
);
