#[cfg(test)]
pub mod test {
    use crate::configuration::Configuration;
    use crate::error::ClifError;
    use crate::settings::{Field, Settings, Visitor};

    #[derive(Debug, Default, PartialEq)]
    pub struct Leafy {
        pub label: String,
    }

    impl Settings for Leafy {
        fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
            v.field(Field::leaf("label", &mut self.label).default("${APPNAME}-leaf"))
        }
    }

    #[derive(Debug, Default)]
    pub struct Inner {
        pub internal: String,
        pub external: String,
        pub leaf_ptr: Option<Box<Leafy>>,
    }

    impl Settings for Inner {
        fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
            v.field(Field::leaf("internal", &mut self.internal).private())?;
            v.field(Field::leaf("external", &mut self.external))?;
            v.field(Field::pointer("leaf_ptr", &mut self.leaf_ptr))
        }
    }

    /// A caller settings type with one of everything.
    #[derive(Debug, Default)]
    pub struct Outer {
        pub core: Option<Box<Configuration>>,
        pub internal: String,
        pub external: String,
        pub number: i64,
        pub boolean: bool,
        pub inner: Inner,
        pub inner_ptr: Option<Box<Inner>>,
        pub handler: Option<fn() -> Result<(), String>>,
    }

    impl Settings for Outer {
        fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
            v.field(Field::pointer("core", &mut self.core))?;
            v.field(Field::leaf("internal", &mut self.internal).private())?;
            v.field(Field::leaf("external", &mut self.external))?;
            v.field(Field::leaf("number", &mut self.number))?;
            v.field(Field::leaf("boolean", &mut self.boolean))?;
            v.field(Field::nested("inner", &mut self.inner))?;
            v.field(Field::pointer("inner_ptr", &mut self.inner_ptr))?;
            v.field(Field::skip("handler"))
        }
    }

    #[derive(Debug, Default)]
    pub struct NoCore {
        pub name: String,
    }

    impl Settings for NoCore {
        fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
            v.field(Field::leaf("name", &mut self.name))
        }
    }

    #[derive(Debug, Default)]
    pub struct CoreByValue {
        pub core: Configuration,
        pub name: String,
    }

    impl Settings for CoreByValue {
        fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
            v.field(Field::nested("core", &mut self.core))?;
            v.field(Field::leaf("name", &mut self.name))
        }
    }

    #[derive(Debug, Default)]
    pub struct EmbeddedCore {
        pub core: Option<Box<Configuration>>,
        pub name: String,
    }

    impl Settings for EmbeddedCore {
        fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
            v.field(Field::pointer("Configuration", &mut self.core).embedded())?;
            v.field(Field::leaf("name", &mut self.name))
        }
    }

    #[derive(Debug, Default)]
    pub struct PrivateCore {
        pub name: String,
        pub core: Option<Box<Configuration>>,
    }

    impl Settings for PrivateCore {
        fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
            v.field(Field::leaf("name", &mut self.name))?;
            v.field(Field::pointer("core", &mut self.core).private())
        }
    }

    #[derive(Debug, Default)]
    pub struct PublicCore {
        pub name: String,
        pub core: Option<Box<Configuration>>,
    }

    impl Settings for PublicCore {
        fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
            v.field(Field::leaf("name", &mut self.name))?;
            v.field(Field::pointer("core", &mut self.core))
        }
    }

    #[derive(Debug, Default)]
    pub struct TwoCores {
        pub primary: Option<Box<Configuration>>,
        pub secondary: Option<Box<Configuration>>,
    }

    impl Settings for TwoCores {
        fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
            v.field(Field::pointer("primary", &mut self.primary))?;
            v.field(Field::pointer("secondary", &mut self.secondary))
        }
    }
}
