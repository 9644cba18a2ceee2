//! Defines helper macros for generating domain port error enums.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for the generated constructors.
    define_port_error! {
        pub enum SampleStoreError {
            Unreachable { message: String } => "store unreachable: {message}",
            Rejected { status: u16 } => "store rejected the request ({status})",
            Decode { message: String, status: u16 } => "decode failed at {status}: {message}",
        }
    }

    #[test]
    fn string_fields_accept_str_literals() {
        let err = SampleStoreError::unreachable("dns failure");
        assert_eq!(err.to_string(), "store unreachable: dns failure");
    }

    #[test]
    fn non_string_fields_keep_their_types() {
        let err = SampleStoreError::rejected(503_u16);
        assert_eq!(err.to_string(), "store rejected the request (503)");
    }

    #[test]
    fn mixed_fields_generate_in_declaration_order() {
        let err = SampleStoreError::decode("truncated body", 200_u16);
        assert_eq!(err.to_string(), "decode failed at 200: truncated body");
    }
}
