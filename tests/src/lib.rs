#[cfg(test)]
mod support;

#[cfg(test)]
mod interception;

#[cfg(test)]
mod load_testing;
