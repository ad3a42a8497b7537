// Code generated by tagconv. DO NOT EDIT.

use anyhow::anyhow;
use crate::conv::int_to_string;
use crate::conv::parse_decimal;
use crate::domain::User;
use crate::wire::UserDto;

/// Converts `UserDto` into `User`.
pub fn user_dto_to_user(from: &UserDto) -> anyhow::Result<User> {
    let from_address = from.Address.as_ref().ok_or_else(|| anyhow!("UserDto.Address is missing"))?;
    let mut to = User::default();
    to.UUID = int_to_string(from.ID.clone());
    let age = from.Age.clone().ok_or_else(|| anyhow!("UserDto.Age is missing"))?;
    let age = parse_decimal(age)?;
    to.Age = age;
    to.City = Some(from_address.City.clone());
    to.Tags = from.Tags.clone();
    Ok(to)
}
