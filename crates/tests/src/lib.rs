pub mod fixtures;

#[cfg(test)]
mod chat_tests;
#[cfg(test)]
mod organization_tests;
