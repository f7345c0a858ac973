
#[cfg(test)]
mod adapter;
#[cfg(test)]
mod kernels;
#[cfg(test)]
mod strategy;
