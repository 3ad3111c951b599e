//! Implementations of HasDependencies for primitives and containers.

use crate::{Dependencies, HasDependencies};

macro_rules! go {
    ($type: ty) => {
        impl HasDependencies for $type {}
    };
}

go!(String);
go!(&'static str);
go!(u8);
go!(u16);
go!(u32);
go!(u64);
go!(i32);
go!(i64);
go!(f64);
go!(bool);
go!(serde_json::Value);

impl<T: HasDependencies> HasDependencies for Vec<T> {
    fn dependencies(&self) -> Dependencies {
        self.iter().fold(Dependencies::default(), |acc, item| {
            acc.merge(item.dependencies())
        })
    }
}

impl<T: HasDependencies> HasDependencies for Box<T> {
    fn dependencies(&self) -> Dependencies {
        self.as_ref().dependencies()
    }
}

impl<K, V: HasDependencies> HasDependencies for std::collections::BTreeMap<K, V> {
    fn dependencies(&self) -> Dependencies {
        self.values().fold(Dependencies::default(), |acc, item| {
            acc.merge(item.dependencies())
        })
    }
}

impl<V: HasDependencies> HasDependencies for Option<V> {
    fn dependencies(&self) -> Dependencies {
        self.iter().fold(Dependencies::default(), |acc, item| {
            acc.merge(item.dependencies())
        })
    }
}

impl<A: HasDependencies, B: HasDependencies> HasDependencies for (A, B) {
    fn dependencies(&self) -> Dependencies {
        self.0.dependencies().merge(self.1.dependencies())
    }
}
