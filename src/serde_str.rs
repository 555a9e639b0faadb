use std::{ops::Deref, str::FromStr};

/// Serializes `T` through its `Display` and `FromStr` implementations
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Serde<T> {
    inner: T,
}

impl<T> Serde<T> {
    pub(crate) fn new(inner: T) -> Self {
        Serde { inner }
    }

    pub(crate) fn into_inner(this: Self) -> T {
        this.inner
    }
}

impl<T> AsRef<T> for Serde<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

impl<T> Deref for Serde<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> FromStr for Serde<T>
where
    T: FromStr,
{
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        T::from_str(s).map(Serde::new)
    }
}

impl<T> serde::Serialize for Serde<T>
where
    T: std::fmt::Display,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.inner)
    }
}

impl<'de, T> serde::Deserialize<'de> for Serde<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = serde::Deserialize::deserialize(deserializer)?;

        s.parse::<T>()
            .map(Serde::new)
            .map_err(serde::de::Error::custom)
    }
}
